//! Integrated daemon: the producer socket, the gateway connection and the
//! feedback listener wired around one shared queue.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ipc_server::IpcServer;
use super::shutdown::{Shutdown, StopReason};
use crate::config::ConfigManager;
use crate::errors::{AppError, AppResult, ErrorContextExt};
use crate::gateway::feedback::LoggingFeedbackSink;
use crate::gateway::tls::load_client_config;
use crate::gateway::{ConnectionManager, Connector, FeedbackListener, FeedbackSink, FeedbackSource, TlsGatewayConnector};
use crate::protocol::FeedbackRecord;
use crate::queue::SharedQueue;

pub struct ApnsDaemon<C: Connector> {
    manager: ConnectionManager<C>,
    feedback: Arc<dyn FeedbackSource>,
    expired: Option<flume::Receiver<FeedbackRecord>>,
    queue: Arc<SharedQueue>,
    shutdown: Shutdown,
}

impl ApnsDaemon<TlsGatewayConnector> {
    /// Build the production daemon from validated settings.
    ///
    /// Fails before anything is bound if a certificate or key file is
    /// missing or unusable.
    pub fn from_config(config: &ConfigManager) -> AppResult<Self> {
        config.validate_files()?;

        let client_config = load_client_config(&config.config().tls)?;
        let endpoint = config.gateway_endpoint();
        let connector = TlsGatewayConnector::new(endpoint.clone(), client_config, config.connect_timeout());

        let (expired_tx, expired_rx) = flume::unbounded();
        let feedback = FeedbackListener::new(connector.for_endpoint(endpoint.feedback()), expired_tx);

        let manager = ConnectionManager::new(connector, config.config().gateway.protocol)
            .with_dispatch_interval(config.dispatch_interval());

        let mut daemon = Self::new(manager, Arc::new(feedback));
        daemon.expired = Some(expired_rx);
        Ok(daemon)
    }
}

impl<C: Connector> ApnsDaemon<C> {
    pub fn new(manager: ConnectionManager<C>, feedback: Arc<dyn FeedbackSource>) -> Self {
        Self {
            manager,
            feedback,
            expired: None,
            queue: Arc::new(SharedQueue::new()),
            shutdown: Shutdown::new(),
        }
    }

    pub fn queue(&self) -> Arc<SharedQueue> {
        self.queue.clone()
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Serve producers on `socket_path` and dispatch until shutdown.
    ///
    /// Failing to bind the socket is fatal and happens before any gateway
    /// connection is attempted. Queued payloads are discarded on exit.
    pub async fn run(self, socket_path: &Path) -> AppResult<()> {
        let ApnsDaemon {
            manager,
            feedback,
            expired,
            queue,
            shutdown,
        } = self;

        let ipc_server = IpcServer::bind(
            socket_path,
            queue.clone(),
            manager.state_handle(),
            feedback,
            shutdown.clone(),
        )?;

        let _socket_guard = scopeguard::guard(socket_path.to_path_buf(), |path| {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove socket {}: {}", path.display(), e);
                }
            }
        });

        #[cfg(unix)]
        {
            let signal_shutdown = shutdown.clone();
            tokio::spawn(async move {
                let installed = super::shutdown::trigger_on_signals(signal_shutdown)
                    .await
                    .with_context("listen for termination signals");
                if let Err(e) = installed {
                    error!(category = e.category(), "{}", e);
                }
            });
        }

        if let Some(expired) = expired {
            tokio::spawn(async move {
                while let Ok(record) = expired.recv_async().await {
                    LoggingFeedbackSink.deliver(record);
                }
            });
        }

        let ipc_task = tokio::spawn(ipc_server.run());
        info!("Daemon running with queue capacity {}", queue.capacity());

        let result = manager.run(queue.clone(), shutdown.clone()).await;

        shutdown.stop(StopReason::DispatchEnded);
        let ipc_result = ipc_task
            .await
            .map_err(|e| AppError::internal(format!("IPC server task failed: {}", e)));
        match ipc_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) | Err(e) => error!(category = e.category(), "IPC server error: {}", e),
        }

        let discarded = queue.len();
        if discarded > 0 {
            warn!("Discarding {} queued payloads", discarded);
        }
        match shutdown.reason() {
            Some(reason) => info!("Daemon stopped: {}", reason),
            None => info!("Daemon stopped"),
        }
        result
    }
}
