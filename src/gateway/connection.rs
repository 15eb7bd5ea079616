//! Primary gateway connection and dispatch loop
//!
//! The manager runs on one task: connect attempts, the dispatch tick, socket
//! reads and the reconnect delay are all driven from a single `select!` loop,
//! so at most one state transition is ever in flight.
//!
//! Transitions:
//! - `Disconnected -> Connecting` on every connect attempt
//! - `Connecting -> Established` on handshake success: failures and the
//!   notification identifier reset, the dispatch timer starts
//! - `Connecting | Established -> Disconnected` on handshake failure, peer
//!   close or I/O error: the timer stops, the identifier resets, failures
//!   increment and the reconnect policy picks the delay
//!
//! A frame in flight when the connection drops is lost; nothing is resent.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{ConnectionState, Connector, ReconnectPolicy, StateHandle};
use crate::daemon::shutdown::Shutdown;
use crate::errors::AppResult;
use crate::protocol::decode::ERROR_RESPONSE_LEN;
use crate::protocol::{decode_error_response, encode_batch, WireFormat};
use crate::queue::SharedQueue;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    Shutdown,
}

pub struct ConnectionManager<C: Connector> {
    connector: C,
    format: WireFormat,
    policy: ReconnectPolicy,
    dispatch_interval: Duration,
    state: StateHandle,
    failures: u32,
    next_identifier: u32,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, format: WireFormat) -> Self {
        Self {
            connector,
            format,
            policy: ReconnectPolicy::default(),
            dispatch_interval: Duration::from_millis(500),
            state: StateHandle::new(),
            failures: 0,
            next_identifier: 0,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Zero is raised to one millisecond; the settings loader rejects it
    /// before it gets here.
    pub fn with_dispatch_interval(mut self, dispatch_interval: Duration) -> Self {
        self.dispatch_interval = dispatch_interval.max(Duration::from_millis(1));
        self
    }

    /// Shared view of the current state, for status reporting.
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn failure_count(&self) -> u32 {
        self.failures
    }

    pub fn notification_identifier(&self) -> u32 {
        self.next_identifier
    }

    /// Run until shutdown. Pending queue contents are not flushed on exit.
    pub async fn run(mut self, queue: Arc<SharedQueue>, shutdown: Shutdown) -> AppResult<()> {
        loop {
            self.on_connecting();

            let connected = tokio::select! {
                result = self.connector.connect() => result,
                _ = shutdown.wait() => break,
            };

            let end = match connected {
                Ok(stream) => {
                    self.on_established();
                    self.serve(stream, &queue, &shutdown).await
                }
                Err(e) => {
                    error!("Could not connect to {}: {}", self.connector.endpoint(), e);
                    SessionEnd::Disconnected
                }
            };

            if end == SessionEnd::Shutdown {
                break;
            }

            let delay = self.on_disconnected();
            if !delay.is_zero() {
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown.wait() => break,
                }
            }
        }

        self.state.set(ConnectionState::Disconnected);
        info!("Gateway connection stopped");
        Ok(())
    }

    fn on_connecting(&mut self) {
        self.state.set(ConnectionState::Connecting);
        info!("Connecting to {}...", self.connector.endpoint());
    }

    pub(crate) fn on_established(&mut self) {
        self.state.set(ConnectionState::Established);
        self.failures = 0;
        self.next_identifier = 0;
        info!("Connected to push gateway {}", self.connector.endpoint());
    }

    /// Record a lost session and return the delay before the next attempt.
    pub(crate) fn on_disconnected(&mut self) -> Duration {
        self.state.set(ConnectionState::Disconnected);
        self.next_identifier = 0;
        self.failures = self.failures.saturating_add(1);

        let delay = self.policy.delay(self.failures);
        if delay.is_zero() {
            error!("Connection reset.");
        } else {
            error!(
                "Could not connect to push gateway. Retry in {} seconds...",
                delay.as_secs()
            );
        }
        delay
    }

    /// Drain the queue and encode it into the frames to write.
    pub(crate) fn drain_frames(&mut self, queue: &SharedQueue) -> Vec<Vec<u8>> {
        let entries = queue.drain_all();
        if entries.is_empty() {
            return Vec::new();
        }

        info!("Sending {} push payloads.", entries.len());
        match encode_batch(self.format, &entries, &mut self.next_identifier) {
            Ok(frames) => frames,
            Err(e) => {
                error!("Dropping batch of {} payloads: {}", entries.len(), e);
                Vec::new()
            }
        }
    }

    async fn serve(&mut self, stream: C::Stream, queue: &SharedQueue, shutdown: &Shutdown) -> SessionEnd {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut ticker = interval(self.dispatch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut read_buf = [0u8; 1024];
        let mut pending: Vec<u8> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    return SessionEnd::Shutdown;
                }
                _ = ticker.tick() => {
                    let frames = self.drain_frames(queue);
                    // A gateway that stops reading must not hold up shutdown
                    tokio::select! {
                        result = write_frames(&mut writer, &frames) => {
                            if let Err(e) = result {
                                error!("Socket error: {}", e);
                                return SessionEnd::Disconnected;
                            }
                        }
                        _ = shutdown.wait() => {
                            warn!("Shutdown while a write to the gateway was stalled");
                            return SessionEnd::Shutdown;
                        }
                    }
                }
                result = reader.read(&mut read_buf) => {
                    match result {
                        Ok(0) => {
                            if !pending.is_empty() {
                                warn!("Discarding {} trailing bytes of a partial gateway reply", pending.len());
                            }
                            debug!("Gateway closed the connection");
                            return SessionEnd::Disconnected;
                        }
                        Ok(n) => {
                            pending.extend_from_slice(&read_buf[..n]);
                            log_gateway_replies(&mut pending);
                        }
                        Err(e) => {
                            error!("Socket error: {}", e);
                            return SessionEnd::Disconnected;
                        }
                    }
                }
            }
        }
    }
}

async fn write_frames<W: AsyncWrite + Unpin>(writer: &mut W, frames: &[Vec<u8>]) -> std::io::Result<()> {
    if frames.is_empty() {
        return Ok(());
    }
    for frame in frames {
        writer.write_all(frame).await?;
    }
    writer.flush().await
}

/// Log every complete reply in `pending`, leaving any partial record behind.
fn log_gateway_replies(pending: &mut Vec<u8>) {
    let complete = pending.len() - pending.len() % ERROR_RESPONSE_LEN;
    for record in pending[..complete].chunks_exact(ERROR_RESPONSE_LEN) {
        match decode_error_response(record) {
            Ok(reply) => error!("Gateway reply: {}", reply),
            Err(e) => error!("Discarding malformed gateway reply: {}", e),
        }
    }
    pending.drain(..complete);
}
