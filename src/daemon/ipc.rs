//! Local socket plumbing shared by the daemon and its clients
//!
//! Every message is a bincode body preceded by its length as a 4-byte
//! little-endian integer. One request and one response per connection.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{AppError, AppResult};

/// Largest message body either side will accept.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Resolve the daemon socket path, creating its directory.
///
/// Defaults to `<home>/.apnsd/apnsd.sock` when no path is configured.
pub fn create_socket_path(configured: Option<&Path>) -> Result<PathBuf> {
    let socket_path = match configured {
        Some(path) => path.to_path_buf(),
        None => {
            let base_dirs = directories::BaseDirs::new().context("Failed to get base directories")?;
            base_dirs.home_dir().join(".apnsd").join("apnsd.sock")
        }
    };

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    Ok(socket_path)
}

/// The PID file lives next to the socket.
pub fn pid_file_path(socket_path: &Path) -> PathBuf {
    socket_path.with_file_name("apnsd.pid")
}

pub fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks that the process exists and we may signal it
    unsafe { libc::kill(pid, 0) == 0 }
}

pub async fn write_message<W, T>(stream: &mut W, message: &T) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = bincode::serde::encode_to_vec(message, bincode::config::standard())?;

    let length = u32::try_from(body.len())
        .map_err(|_| AppError::ipc(format!("Message too large to frame: {} bytes", body.len())))?;
    stream
        .write_all(&length.to_le_bytes())
        .await
        .map_err(|e| AppError::ipc_with_source("Failed to write message length", e))?;
    stream
        .write_all(&body)
        .await
        .map_err(|e| AppError::ipc_with_source("Failed to write message payload", e))?;
    stream
        .flush()
        .await
        .map_err(|e| AppError::ipc_with_source("Failed to flush message", e))?;
    Ok(())
}

pub async fn read_message<R, T>(stream: &mut R, max_size: usize) -> AppResult<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut length_bytes = [0u8; 4];
    stream
        .read_exact(&mut length_bytes)
        .await
        .map_err(|e| AppError::ipc_with_source("Failed to read message length", e))?;

    let length = u32::from_le_bytes(length_bytes) as usize;
    if length > max_size {
        return Err(AppError::ipc(format!(
            "Message too large: {} bytes (max: {})",
            length, max_size
        )));
    }

    let mut body = vec![0u8; length];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| AppError::ipc_with_source("Failed to read message payload", e))?;

    let (message, _): (T, usize) = bincode::serde::decode_from_slice(&body, bincode::config::standard())?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::shared::{DaemonMessage, DaemonResponse};
    use crate::queue::QueueError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_message_framing() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let message = DaemonMessage::Push {
            device: "ab".repeat(32),
            payload: r#"{"aps":{"alert":"hi"}}"#.into(),
        };

        write_message(&mut client, &message).await.unwrap();
        let received: DaemonMessage = read_message(&mut server, MAX_MESSAGE_SIZE).await.unwrap();
        assert_eq!(received, message);

        let response = DaemonResponse::Rejected(QueueError::QueueFull { capacity: 100 });
        write_message(&mut server, &response).await.unwrap();
        let received: DaemonResponse = read_message(&mut client, MAX_MESSAGE_SIZE).await.unwrap();
        assert_eq!(received, response);
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&(2_000_000u32).to_le_bytes()).await.unwrap();
        let result: AppResult<DaemonMessage> = read_message(&mut server, MAX_MESSAGE_SIZE).await;
        match result {
            Err(AppError::Ipc { message, .. }) => assert!(message.contains("too large")),
            other => panic!("expected IPC error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_a_serialization_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&1u32.to_le_bytes()).await.unwrap();
        client.write_all(&[0xFF]).await.unwrap();
        let result: AppResult<DaemonMessage> = read_message(&mut server, MAX_MESSAGE_SIZE).await;
        assert!(matches!(result, Err(AppError::Serialization { .. })));
    }

    #[test]
    fn test_socket_and_pid_paths() {
        let dir = TempDir::new().unwrap();
        let configured = dir.path().join("run").join("apnsd.sock");
        let socket_path = create_socket_path(Some(&configured)).unwrap();
        assert_eq!(socket_path, configured);
        assert!(configured.parent().unwrap().is_dir());
        assert_eq!(pid_file_path(&socket_path), dir.path().join("run").join("apnsd.pid"));
    }

    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }
}
