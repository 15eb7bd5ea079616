//! Gateway connections
//!
//! This module provides:
//! - The [`Connector`] seam that opens an encrypted session to an endpoint
//! - The TLS implementation used in production ([`tls::TlsGatewayConnector`])
//! - The connection manager state machine that drives dispatch
//! - The on-demand feedback listener

pub mod connection;
pub mod feedback;
pub mod tls;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

pub use connection::ConnectionManager;
pub use feedback::{FeedbackListener, FeedbackSink, FeedbackSource};
pub use tls::TlsGatewayConnector;

/// Errors raised while opening or using a gateway session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connect(#[from] io::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake error: {0}")]
    Handshake(String),

    #[error("invalid server name '{0}'")]
    InvalidServerName(String),

    #[error("operation timed out: {operation}")]
    Timeout { operation: String },
}

/// A gateway host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The feedback service lives next to the gateway: same credentials,
    /// `gateway` replaced by `feedback` in the host name, port plus one.
    pub fn feedback(&self) -> Endpoint {
        Endpoint {
            host: self.host.replace("gateway", "feedback"),
            port: self.port.wrapping_add(1),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens encrypted sessions to one endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Connect and complete the handshake.
    async fn connect(&self) -> Result<Self::Stream, TransportError>;

    fn endpoint(&self) -> &Endpoint;
}

/// Lifecycle of the primary gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Established,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Established,
            _ => Self::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Established => 2,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Established => f.write_str("established"),
        }
    }
}

/// Read-only view of the connection state for status queries.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ConnectionState::Disconnected.as_u8())))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.0.store(state.as_u8(), Ordering::Relaxed);
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconnect delay as a function of consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Failures tolerated before the backoff applies.
    pub max_immediate_retries: u32,
    pub backoff: Duration,
}

impl ReconnectPolicy {
    /// Delay before the next connect attempt after `failures` consecutive
    /// failures.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures > self.max_immediate_retries {
            self.backoff
        } else {
            Duration::ZERO
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_immediate_retries: 3,
            backoff: Duration::from_secs(30),
        }
    }
}
