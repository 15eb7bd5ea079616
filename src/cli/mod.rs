//! CLI module providing command-line interface functionality
//!
//! This module handles argument parsing, logging setup and routing to the
//! command handlers, and maps failures to process exit codes.

pub mod commands;
pub mod context;
pub mod handlers;

use anyhow::Result;
use clap::Parser;

pub use commands::{Cli, Commands, DaemonAction};
pub use context::{CliContext, LogMode};
pub use handlers::CommandHandler;

use crate::queue::QueueError;

pub struct CliApp;

impl CliApp {
    /// Parse command line arguments and execute the requested command
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();

        let context = match &cli.command {
            Commands::Init { .. } => CliContext::without_settings(cli.config.clone(), cli.verbose)?,
            _ => CliContext::new(cli.config.clone(), cli.verbose)?,
        };

        let log_mode = match &cli.command {
            Commands::Daemon {
                action: DaemonAction::Start { .. },
            } if CliContext::is_detached() => LogMode::Detached,
            Commands::Daemon {
                action: DaemonAction::Start { detach: false },
            } => LogMode::Foreground,
            _ => LogMode::Client,
        };
        let _log_guard = context.init_logging(log_mode)?;

        let handler = CommandHandler::new(context);
        handler.handle_command(cli.command).await
    }
}

/// Exit status for a failed command: queue rejections have their own codes,
/// everything else is 1.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<QueueError>()
        .map(QueueError::exit_code)
        .unwrap_or(1)
}

/// Text printed for a failed command. Queue rejections print only the
/// producer-facing sentence.
pub fn error_message(err: &anyhow::Error) -> String {
    if err.downcast_ref::<QueueError>().is_some() {
        err.to_string()
    } else {
        format!("{:#}", err)
    }
}
