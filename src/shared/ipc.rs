//! IPC (Inter-Process Communication) client module
//!
//! Producers attach to the daemon socket, send one request, read one reply
//! and detach.

use crate::daemon::ipc::{read_message, write_message};
use crate::daemon::{DaemonMessage, DaemonResponse};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::net::UnixStream;
use tracing::debug;

/// Configuration for IPC client behavior
#[derive(Debug, Clone)]
pub struct IpcClientConfig {
    /// Maximum allowed response size in bytes
    pub max_response_size: usize,
}

impl Default for IpcClientConfig {
    fn default() -> Self {
        Self {
            max_response_size: 1024 * 1024,
        }
    }
}

impl IpcClientConfig {
    /// For acknowledgements and status replies
    pub fn small_response() -> Self {
        Self {
            max_response_size: 1024,
        }
    }

    /// For feedback lists, which grow with the number of expired tokens
    pub fn large_response() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct IpcClient {
    config: IpcClientConfig,
}

impl IpcClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: IpcClientConfig) -> Self {
        Self { config }
    }

    /// Send one message and wait for the daemon's reply.
    pub async fn send_daemon_message(&self, socket_path: &Path, message: DaemonMessage) -> Result<DaemonResponse> {
        debug!("Sending IPC message to daemon at {}", socket_path.display());

        let mut stream = UnixStream::connect(socket_path)
            .await
            .context("Failed to connect to daemon socket")?;

        write_message(&mut stream, &message).await?;
        debug!("Message sent, waiting for response");

        let response = read_message(&mut stream, self.config.max_response_size).await?;
        debug!("Received response {:?}", response);
        Ok(response)
    }
}

/// Convenience functions for common IPC operations
pub mod convenience {
    use super::*;

    /// Hand one payload to the daemon queue.
    pub async fn push_notification(socket_path: &Path, device_hex: &str, payload: &str) -> Result<DaemonResponse> {
        let client = IpcClient::with_config(IpcClientConfig::small_response());
        let message = DaemonMessage::Push {
            device: device_hex.to_string(),
            payload: payload.to_string(),
        };
        client.send_daemon_message(socket_path, message).await
    }

    pub async fn ping_daemon(socket_path: &Path) -> Result<DaemonResponse> {
        let client = IpcClient::with_config(IpcClientConfig::small_response());
        client.send_daemon_message(socket_path, DaemonMessage::Ping).await
    }

    pub async fn get_daemon_status(socket_path: &Path) -> Result<DaemonResponse> {
        let client = IpcClient::with_config(IpcClientConfig::small_response());
        client.send_daemon_message(socket_path, DaemonMessage::Status).await
    }

    /// Ask the daemon to poll the feedback service once.
    pub async fn check_feedback(socket_path: &Path) -> Result<DaemonResponse> {
        let client = IpcClient::with_config(IpcClientConfig::large_response());
        client.send_daemon_message(socket_path, DaemonMessage::CheckFeedback).await
    }

    pub async fn shutdown_daemon(socket_path: &Path) -> Result<DaemonResponse> {
        let client = IpcClient::with_config(IpcClientConfig::small_response());
        client.send_daemon_message(socket_path, DaemonMessage::Shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ipc_client_config_sizes() {
        assert_eq!(IpcClientConfig::default().max_response_size, 1024 * 1024);
        assert_eq!(IpcClientConfig::small_response().max_response_size, 1024);
        assert_eq!(IpcClient::new().config.max_response_size, 1024 * 1024);
    }

    #[tokio::test]
    async fn test_no_daemon_listening() {
        let dir = TempDir::new().unwrap();
        let err = convenience::ping_daemon(&dir.path().join("apnsd.sock"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }
}
