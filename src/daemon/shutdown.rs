//! Daemon stop token.
//!
//! Every long-running task selects on [`Shutdown::wait`]. The first stop
//! request records why the daemon is going down; later requests are ignored
//! so the log shows the cause, not the echo.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A termination signal, by name
    Signal(&'static str),
    /// A producer sent `Shutdown` over the socket
    IpcRequest,
    /// The gateway loop returned on its own
    DispatchEnded,
    /// Stopped by the embedding code
    Requested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Signal(name) => write!(f, "received {}", name),
            StopReason::IpcRequest => write!(f, "shutdown requested over IPC"),
            StopReason::DispatchEnded => write!(f, "gateway loop ended"),
            StopReason::Requested => write!(f, "stop requested"),
        }
    }
}

/// Cloneable handle; all clones observe the same stop request.
#[derive(Clone)]
pub struct Shutdown {
    reason: Arc<watch::Sender<Option<StopReason>>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (reason, _) = watch::channel(None);
        Self {
            reason: Arc::new(reason),
        }
    }

    /// Record `reason` and wake every waiter, unless a stop is already under way.
    pub fn stop(&self, reason: StopReason) {
        let first = self.reason.send_if_modified(|current| match current {
            Some(_) => false,
            None => {
                *current = Some(reason);
                true
            }
        });
        if first {
            info!("Stopping: {}", reason);
        }
    }

    pub fn trigger(&self) {
        self.stop(StopReason::Requested);
    }

    /// Resolves once a stop has been requested, immediately if it already was.
    pub async fn wait(&self) {
        let mut receiver = self.reason.subscribe();
        // The sender lives in `self`, so the channel cannot close under us
        let _ = receiver.wait_for(Option::is_some).await;
    }

    pub fn is_shutdown(&self) -> bool {
        self.reason.borrow().is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.reason.borrow()
    }
}

/// Stop on SIGTERM, SIGHUP or Ctrl-C. Returns early if something else stops
/// the daemon first.
#[cfg(unix)]
pub async fn trigger_on_signals(shutdown: Shutdown) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
        result = tokio::signal::ctrl_c() => {
            result?;
            "Ctrl-C"
        }
        _ = shutdown.wait() => return Ok(()),
    };

    shutdown.stop(StopReason::Signal(name));
    Ok(())
}
