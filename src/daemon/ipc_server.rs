//! IPC Server for daemon communication
//!
//! Accepts producer connections on the local Unix socket and serves each on
//! its own task. Pushes go straight into the shared queue; the enqueue result
//! is the reply, so a producer learns synchronously whether its payload was
//! accepted.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use super::ipc::{read_message, write_message, MAX_MESSAGE_SIZE};
use super::shared::{DaemonMessage, DaemonResponse};
use super::shutdown::{Shutdown, StopReason};
use crate::errors::{AppError, AppResult};
use crate::gateway::{FeedbackSource, StateHandle};
use crate::queue::SharedQueue;

/// Everything a request handler needs, cloned into each client task.
#[derive(Clone)]
struct Shared {
    queue: Arc<SharedQueue>,
    state: StateHandle,
    feedback: Arc<dyn FeedbackSource>,
    shutdown: Shutdown,
    start_time: Instant,
}

pub struct IpcServer {
    listener: UnixListener,
    shared: Shared,
}

impl IpcServer {
    /// Bind the socket. A stale socket file from a previous run is replaced,
    /// but one another daemon is still answering on is left alone.
    pub fn bind(
        socket_path: &Path,
        queue: Arc<SharedQueue>,
        state: StateHandle,
        feedback: Arc<dyn FeedbackSource>,
        shutdown: Shutdown,
    ) -> AppResult<Self> {
        if socket_path.exists() {
            if std::os::unix::net::UnixStream::connect(socket_path).is_ok() {
                return Err(AppError::daemon(format!(
                    "Another daemon is already listening on {}",
                    socket_path.display()
                )));
            }
            std::fs::remove_file(socket_path)
                .map_err(|e| AppError::socket_with_source(socket_path, "remove stale socket", e))?;
        }

        let listener = UnixListener::bind(socket_path)
            .map_err(|e| AppError::socket_with_source(socket_path, "bind", e))?;

        info!("IPC server bound to socket: {}", socket_path.display());

        Ok(IpcServer {
            listener,
            shared: Shared {
                queue,
                state,
                feedback,
                shutdown,
                start_time: Instant::now(),
            },
        })
    }

    pub async fn run(self) -> AppResult<()> {
        info!("IPC server started");
        let shutdown = self.shared.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            debug!("New IPC client connection");
                            let shared = self.shared.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, shared).await {
                                    error!(category = e.category(), "Error handling IPC client: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept IPC connection: {}", e);
                        }
                    }
                }
            }
        }

        info!("IPC server stopped");
        Ok(())
    }
}

async fn handle_client(mut stream: UnixStream, shared: Shared) -> AppResult<()> {
    let message: DaemonMessage = read_message(&mut stream, MAX_MESSAGE_SIZE).await?;
    debug!("Received IPC message: {:?}", message);

    let response = respond(message, &shared).await;

    write_message(&mut stream, &response).await?;
    debug!("Sent IPC response: {:?}", response);
    Ok(())
}

async fn respond(message: DaemonMessage, shared: &Shared) -> DaemonResponse {
    match message {
        DaemonMessage::Push { device, payload } => match shared.queue.enqueue_hex(&device, &payload) {
            Ok(()) => DaemonResponse::Ok,
            Err(e) => {
                warn!("Rejected push: {}", e);
                DaemonResponse::Rejected(e)
            }
        },
        DaemonMessage::Status => DaemonResponse::Status {
            queue_size: shared.queue.len(),
            capacity: shared.queue.capacity(),
            connection_state: shared.state.get(),
            uptime_secs: shared.start_time.elapsed().as_secs(),
        },
        DaemonMessage::CheckFeedback => match shared.feedback.check().await {
            Ok(records) => DaemonResponse::Feedback(records),
            Err(e) => {
                error!(category = e.category(), "Feedback check failed: {}", e);
                let hint = if e.is_retryable() { " (try again later)" } else { "" };
                DaemonResponse::Error(format!("{}{}", e, hint))
            }
        },
        DaemonMessage::Shutdown => {
            info!("Received shutdown request via IPC");
            shared.shutdown.stop(StopReason::IpcRequest);
            DaemonResponse::Ok
        }
        DaemonMessage::Ping => DaemonResponse::Ok,
    }
}
