//! Log setup for the CLI.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a log filter, e.g. `authq=debug,mquery=trace`.
pub const LOG_ENV: &str = "AUTHQ_LOG";

/// Level used when nothing else is configured.
const DEFAULT_LEVEL: &str = "warn";

/// Picks the filter directive.
///
/// `--verbose` and `--quiet` win, then `AUTHQ_LOG`, then the config file.
pub fn filter_directive(
    verbose: bool,
    quiet: bool,
    env_filter: Option<&str>,
    config_level: Option<&str>,
) -> String {
    if verbose {
        return "debug".to_string();
    }
    if quiet {
        return "error".to_string();
    }
    env_filter
        .filter(|f| !f.trim().is_empty())
        .or(config_level)
        .unwrap_or(DEFAULT_LEVEL)
        .to_string()
}

/// Installs a stderr subscriber. Calling it twice is harmless.
pub fn init(verbose: bool, quiet: bool, config_level: Option<&str>) {
    let from_env = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(verbose, quiet, from_env.as_deref(), config_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_win() {
        assert_eq!(filter_directive(true, false, Some("trace"), Some("info")), "debug");
        assert_eq!(filter_directive(false, true, Some("trace"), Some("info")), "error");
    }

    #[test]
    fn test_env_then_config_then_default() {
        assert_eq!(
            filter_directive(false, false, Some("mquery=trace"), Some("info")),
            "mquery=trace"
        );
        assert_eq!(filter_directive(false, false, Some(" "), Some("info")), "info");
        assert_eq!(filter_directive(false, false, None, None), DEFAULT_LEVEL);
    }
}
