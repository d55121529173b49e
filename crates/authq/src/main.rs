use clap::Parser;
use std::process::ExitCode;

mod cli;
mod commands;
mod dispatch;
mod output;

use authq::config::load_config;
use authq::services::ServiceError;
use cli::Cli;
use commands::{caller_from_cli, CommandContext, CommandError, Workspace};
use dispatch::{CallerCommand, CallerDispatch, LocalCommand, LocalDispatch};
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                let mut error = serde_json::json!({
                    "code": error_code(&e),
                    "message": e.to_string(),
                });
                if let Some(details) = error_details(&e) {
                    error["details"] = details;
                }
                let error_json = serde_json::json!({ "error": error });
                eprintln!("{error_json:#}");
            } else {
                eprintln!("Error: {e}");
            }
            error_exit_code(&e)
        }
    }
}

async fn run(cli: &Cli) -> commands::Result<()> {
    let config = load_config()?;
    authq::logging::init(cli.verbose, cli.quiet, config.log.level.as_deref());
    let ctx = CommandContext::from_cli(cli, config);

    if let Some(dispatch) = LocalDispatch::try_from_cli(cli) {
        return dispatch.execute(&ctx);
    }

    let Some(dispatch) = CallerDispatch::from_cli(cli) else {
        return Ok(());
    };
    let caller = caller_from_cli(cli)?;
    debug!(caller = caller.id(), roles = %caller.roles(), "resolved caller");

    let ws = Workspace::open(cli, &ctx.config)?;
    dispatch.execute(&ctx, &ws, &caller).await
}

/// Returns the error code string for JSON output.
fn error_code(e: &CommandError) -> &'static str {
    match e {
        CommandError::Service(e) => e.code(),
        CommandError::Caller(_) | CommandError::MissingCaller => "INVALID_CALLER",
        CommandError::Dataset(_) => "DATASET_ERROR",
        CommandError::Tenant(_) => "TENANT_SERVICE_ERROR",
        CommandError::Config(_) => "CONFIG_ERROR",
        CommandError::Io(_) => "IO_ERROR",
        CommandError::Json(_) => "JSON_ERROR",
    }
}

/// Returns field or row details for rejected input.
fn error_details(e: &CommandError) -> Option<serde_json::Value> {
    match e {
        CommandError::Service(e) => e.details(),
        _ => None,
    }
}

/// Returns the exit code for an error.
fn error_exit_code(e: &CommandError) -> ExitCode {
    match e {
        CommandError::Service(ServiceError::Query(_))
        | CommandError::Service(ServiceError::Filter(_))
        | CommandError::Service(ServiceError::Page(_))
        | CommandError::Service(ServiceError::InvalidData { .. })
        | CommandError::Service(ServiceError::NameTaken(_))
        | CommandError::Service(ServiceError::EmailTaken(_))
        | CommandError::Service(ServiceError::InvalidImport(_)) => ExitCode::from(1),
        CommandError::Service(ServiceError::Tenant(e)) | CommandError::Tenant(e) => {
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(2))
        }
        CommandError::Service(ServiceError::NotFound { .. }) => ExitCode::from(4),
        CommandError::Service(ServiceError::Forbidden) => ExitCode::from(6),
        CommandError::Caller(_) | CommandError::MissingCaller => ExitCode::from(6),
        CommandError::Service(ServiceError::Store(_))
        | CommandError::Service(ServiceError::Decode { .. }) => ExitCode::from(5),
        CommandError::Dataset(_) | CommandError::Config(_) => ExitCode::from(5),
        CommandError::Io(_) => ExitCode::from(3),
        CommandError::Json(_) => ExitCode::from(1),
    }
}
