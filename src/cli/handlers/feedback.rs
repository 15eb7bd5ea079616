use super::super::CliContext;
use crate::daemon::DaemonResponse;
use crate::protocol::FeedbackRecord;
use crate::shared::ipc::convenience::check_feedback;
use anyhow::{bail, Context, Result};

/// Prints the expired device tokens the daemon collects from the feedback
/// service, one `<timestamp> <token-hex>` line each.
pub struct FeedbackHandler<'a> {
    context: &'a CliContext,
}

impl<'a> FeedbackHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    pub async fn handle_feedback(&self) -> Result<()> {
        let socket_path = self.context.socket_path()?;
        let response = check_feedback(&socket_path).await.context("Daemon not running?")?;

        match response {
            DaemonResponse::Feedback(records) => {
                for record in &records {
                    println!("{}", format_record(record));
                }
                Ok(())
            }
            DaemonResponse::Error(message) => bail!("Feedback check failed: {}", message),
            other => bail!("Unexpected daemon response: {:?}", other),
        }
    }
}

fn format_record(record: &FeedbackRecord) -> String {
    format!("{} {}", record.timestamp, record.token_hex())
}

super::traits::impl_context_handler!(FeedbackHandler<'a>);
