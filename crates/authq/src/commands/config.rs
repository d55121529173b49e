//! Config command implementation.
//!
//! View and change settings in the config file.

use authq::config::{get_config_path, load_config, save_config, Config};
use owo_colors::OwoColorize;

use super::{CommandContext, Result};

/// Options for the config set command.
pub struct ConfigSetOptions {
    /// Dotted configuration key.
    pub key: String,
    /// Configuration value.
    pub value: String,
}

/// Executes the config show command.
pub fn execute_show(ctx: &CommandContext) -> Result<()> {
    let config = load_config()?;
    let path = get_config_path()?;

    if ctx.json_output {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        let header = "Configuration";
        if ctx.use_colors {
            println!("{}\n", header.green().bold());
        } else {
            println!("{header}\n");
        }
        println!("File: {}", path.display());
        println!("Exists: {}\n", path.exists());
        print!("{}", format_effective(&config));
    }

    Ok(())
}

/// Renders the effective settings, defaults included.
fn format_effective(config: &Config) -> String {
    let settings = config.query_settings();
    let policy = serde_json::to_value(settings.policy)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    let mut out = String::from("[query]\n");
    out.push_str(&format!("  max_depth: {}\n", settings.max_depth));
    out.push_str(&format!("  collation: {}\n", settings.collation));
    out.push_str(&format!("  total_page_policy: {policy}\n"));
    out.push_str(&format!("  default_page_size: {}\n", config.default_page_size()));

    out.push_str("\n[tenant_service]\n");
    match &config.tenant_service.base_url {
        Some(url) => out.push_str(&format!("  base_url: {url}\n")),
        None => out.push_str("  (tenants read from the dataset)\n"),
    }
    if let Some(secs) = config.tenant_service.timeout_secs {
        out.push_str(&format!("  timeout_secs: {secs}\n"));
    }
    if let Some(retries) = config.tenant_service.max_retries {
        out.push_str(&format!("  max_retries: {retries}\n"));
    }

    out.push_str("\n[log]\n");
    out.push_str(&format!(
        "  level: {}\n",
        config.log.level.as_deref().unwrap_or("warn")
    ));

    out.push_str("\n[dataset]\n");
    match &config.dataset.path {
        Some(path) => out.push_str(&format!("  path: {}\n", path.display())),
        None => out.push_str("  path: (default data directory)\n"),
    }
    out
}

/// Executes the config set command.
pub fn execute_set(ctx: &CommandContext, opts: &ConfigSetOptions) -> Result<()> {
    let mut config = load_config()?;
    config.set(&opts.key, &opts.value)?;
    let path = save_config(&config)?;

    if ctx.json_output {
        let output = serde_json::json!({
            "status": "success",
            "key": opts.key,
            "value": opts.value,
            "path": path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        println!("Set {} = {}", opts.key, opts.value);
    }

    Ok(())
}

/// Executes the config path command.
pub fn execute_path(ctx: &CommandContext) -> Result<()> {
    let path = get_config_path()?;

    if ctx.json_output {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", path.display());
    }

    Ok(())
}
