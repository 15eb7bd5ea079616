//! Command handlers for all CLI operations
//!
//! Each command family lives in its own handler; this module only routes.

mod config;
mod daemon;
mod feedback;
mod push;
pub mod traits;

use super::{CliContext, Commands};
use anyhow::Result;

pub use config::ConfigHandler;
pub use daemon::DaemonHandler;
pub use feedback::FeedbackHandler;
pub use push::{rejection, PushHandler};
use traits::HandlerBuilder;

/// Coordinates all command handling operations with dependency injection via CliContext
pub struct CommandHandler {
    context: CliContext,
}

impl CommandHandler {
    pub fn new(context: CliContext) -> Self {
        Self { context }
    }

    /// Route commands to their appropriate handlers
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        let builder = HandlerBuilder::new(&self.context);
        match command {
            Commands::Push { device, payload } => {
                builder
                    .create_with_context::<PushHandler>()
                    .handle_push(device, payload)
                    .await
            }
            Commands::Daemon { action } => {
                builder
                    .create_with_context::<DaemonHandler>()
                    .handle_daemon(action)
                    .await
            }
            Commands::Feedback => {
                builder
                    .create_with_context::<FeedbackHandler>()
                    .handle_feedback()
                    .await
            }
            Commands::Init { force } => {
                builder
                    .create_with_context::<ConfigHandler>()
                    .handle_init(force)
                    .await
            }
        }
    }
}
