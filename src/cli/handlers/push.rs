//! Producer handler
//!
//! Validates a notification locally, then attaches to the daemon, enqueues it
//! and detaches. Nothing is printed on success.

use super::super::CliContext;
use crate::daemon::DaemonResponse;
use crate::queue::{DeviceToken, QueueError, MAX_PAYLOAD_LEN};
use crate::shared::ipc::convenience::push_notification;
use anyhow::{bail, Context, Result};
use base64::Engine;
use tracing::debug;

pub struct PushHandler<'a> {
    context: &'a CliContext,
}

impl<'a> PushHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    pub async fn handle_push(&self, device: String, payload_base64: String) -> Result<()> {
        let (device, payload) = validate(&device, &payload_base64)?;

        let socket_path = self.context.socket_path()?;
        let response = push_notification(&socket_path, &device.to_hex(), &payload)
            .await
            .context("Daemon not running?")?;

        match response {
            DaemonResponse::Ok => {
                debug!("Queued {} byte payload for {}", payload.len(), device);
                Ok(())
            }
            DaemonResponse::Rejected(e) => Err(rejection(e)),
            DaemonResponse::Error(message) => bail!("Daemon error: {}", message),
            other => bail!("Unexpected daemon response: {:?}", other),
        }
    }
}

/// Check the token and payload without contacting the daemon.
fn validate(device: &str, payload_base64: &str) -> Result<(DeviceToken, String)> {
    let device = DeviceToken::from_hex(device).map_err(rejection)?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload_base64.trim())
        .context("Payload is not valid base64.")?;
    let payload = String::from_utf8(bytes).context("Payload is not valid UTF-8.")?;

    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(rejection(QueueError::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_PAYLOAD_LEN,
        }));
    }
    Ok((device, payload))
}

/// Wrap a queue rejection with the producer-facing message. The
/// [`QueueError`] stays reachable for the exit code.
pub fn rejection(err: QueueError) -> anyhow::Error {
    let message = match &err {
        QueueError::QueueFull { .. } => "Payload queue is full.",
        QueueError::InvalidToken { .. } => "Invalid device identifier.",
        QueueError::PayloadTooLarge { .. } => "Payload is too large.",
    };
    anyhow::Error::new(err).context(message)
}

super::traits::impl_context_handler!(PushHandler<'a>);
