//! heatctl - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Authentication or endpoint failure
//! - 4: Stack reached a failed state
//! - 5: Timed out
//! - 6: Conflicting lifecycle operation
//! - 130: Cancelled

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use heat_api::ApiError;
use heat_stack::{DesiredState, StackError};

mod commands;
mod output;

use commands::{Cli, StateArg};
use output::FailureRecord;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const AUTH_FAILURE: u8 = 3;
    pub const RECONCILIATION_FAILED: u8 = 4;
    pub const TIMEOUT: u8 = 5;
    pub const CONFLICT: u8 = 6;
    pub const CANCELLED: u8 = 130;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, abandoning wait");
            trigger.cancel();
        }
    });

    let result = match cli.state {
        StateArg::Present => commands::ensure::execute(&cli, DesiredState::Present, &cancel).await,
        StateArg::Absent => commands::ensure::execute(&cli, DesiredState::Absent, &cancel).await,
        StateArg::List => commands::list::execute(&cli).await,
        StateArg::Show => commands::show::execute(&cli).await,
        StateArg::Debug => commands::debug::execute(&cli).await,
    };

    let emitted = match &result {
        Ok(record) => output::emit(record),
        Err(e) => output::emit(&FailureRecord::new(format!("{:#}", e))),
    };
    if let Err(e) = emitted {
        error!("Failed to write result: {:#}", e);
        return ExitCode::from(ExitCodes::GENERAL_ERROR);
    }

    match result {
        Ok(_) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Logs go to stderr; stdout is reserved for the result record.
fn init_logging(cli: &Cli) {
    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env().add_directive(LevelFilter::WARN.into());
    for target in ["heat_cli", "heat_stack", "heat_api"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    let registry = tracing_subscriber::registry().with(filter);
    // A subscriber that is already installed stays in place.
    let _ = if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<StackError>() {
        return match err {
            StackError::Validation(_) | StackError::Template(_) => ExitCodes::INVALID_ARGS,
            StackError::Authentication(_) | StackError::EndpointNotFound(_) => ExitCodes::AUTH_FAILURE,
            StackError::ReconciliationFailed { .. } => ExitCodes::RECONCILIATION_FAILED,
            StackError::Timeout { .. } => ExitCodes::TIMEOUT,
            StackError::Conflict(_) => ExitCodes::CONFLICT,
            StackError::Cancelled(_) => ExitCodes::CANCELLED,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    match e.downcast_ref::<ApiError>() {
        Some(ApiError::Config(_)) => ExitCodes::INVALID_ARGS,
        Some(ApiError::Authentication(_)) | Some(ApiError::EndpointNotFound(_)) => {
            ExitCodes::AUTH_FAILURE
        }
        Some(ApiError::Conflict(_)) => ExitCodes::CONFLICT,
        _ => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_errors_map_to_exit_codes() {
        let cases = [
            (StackError::Validation("x".into()), ExitCodes::INVALID_ARGS),
            (StackError::Authentication("x".into()), ExitCodes::AUTH_FAILURE),
            (StackError::failed("CREATE_FAILED", "x"), ExitCodes::RECONCILIATION_FAILED),
            (
                StackError::Timeout {
                    stack: "demo".into(),
                    seconds: 60,
                },
                ExitCodes::TIMEOUT,
            ),
            (StackError::Conflict("x".into()), ExitCodes::CONFLICT),
            (StackError::Cancelled("demo".into()), ExitCodes::CANCELLED),
            (StackError::TransientNetwork("x".into()), ExitCodes::GENERAL_ERROR),
        ];

        for (err, code) in cases {
            assert_eq!(categorize_error(&anyhow::Error::new(err)), code);
        }
    }

    #[test]
    fn test_context_does_not_hide_api_errors() {
        let err = anyhow::Error::new(ApiError::Config("cloud 'lab' not defined".into()))
            .context("loading cloud 'lab'");
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_logging_can_be_initialized_twice() {
        let cli = Cli::try_parse_from(["heatctl", "--state", "list", "--log-json"]).unwrap();
        init_logging(&cli);
        init_logging(&cli);
    }

    #[test]
    fn test_unknown_errors_are_general() {
        assert_eq!(
            categorize_error(&anyhow::anyhow!("something odd")),
            ExitCodes::GENERAL_ERROR
        );
    }
}
