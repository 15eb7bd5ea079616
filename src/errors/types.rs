//! Error types for the apnsd service
//!
//! This module defines the error conditions that can occur throughout the
//! daemon and its producer CLI, grouped by the class that decides how they
//! are handled: configuration errors are fatal, queue errors belong to one
//! producer, transport errors feed the reconnect loop.

use std::path::PathBuf;
use thiserror::Error;

use crate::gateway::TransportError;
use crate::protocol::CodecError;
use crate::queue::QueueError;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing settings. Settings file recreated at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Could not find {what} file. ({path})")]
    MissingFile { what: String, path: PathBuf },

    // Producer-facing queue errors
    #[error(transparent)]
    Queue(#[from] QueueError),

    // Wire protocol errors
    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),

    // Gateway connection errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // Daemon and IPC errors
    #[error("Daemon error: {message}")]
    Daemon { message: String },

    #[error("IPC error: {message}")]
    Ipc {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Socket error at '{path}': {operation}")]
    Socket {
        path: PathBuf,
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // I/O errors
    #[error("File I/O error for '{path}': {operation}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Serialization errors
    #[error("TOML parsing error: {context}")]
    TomlParsing {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },

    // Generic/catch-all errors
    #[error("{message}")]
    Other {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new Config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn missing_file(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingFile {
            what: what.into(),
            path: path.into(),
        }
    }

    pub fn daemon(message: impl Into<String>) -> Self {
        Self::Daemon {
            message: message.into(),
        }
    }

    /// Create a new IPC error without an underlying cause
    pub fn ipc(message: impl Into<String>) -> Self {
        Self::Ipc {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new IPC error with source
    pub fn ipc_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Ipc {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn socket_with_source(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Socket {
            path: path.into(),
            operation: operation.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new I/O error with source
    pub fn io_with_source(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Io {
            path: path.into(),
            operation: operation.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Configuration problems stop the daemon before any connection is made
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::ConfigNotFound { .. } | Self::MissingFile { .. } | Self::TomlParsing { .. }
        )
    }

    /// Transport failures are recovered by reconnecting
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } | Self::ConfigNotFound { .. } | Self::MissingFile { .. } => "config",
            Self::Queue(_) => "queue",
            Self::Codec(_) => "codec",
            Self::Transport(_) => "transport",
            Self::Daemon { .. } | Self::Socket { .. } => "daemon",
            Self::Ipc { .. } => "ipc",
            Self::Io { .. } => "io",
            Self::TomlParsing { .. } | Self::Serialization { .. } => "serialization",
            Self::Internal { .. } | Self::Other { .. } => "internal",
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        let operation = match err.kind() {
            std::io::ErrorKind::NotFound => "file not found",
            std::io::ErrorKind::PermissionDenied => "permission denied",
            std::io::ErrorKind::ConnectionRefused => "connection refused",
            std::io::ErrorKind::ConnectionAborted => "connection aborted",
            std::io::ErrorKind::TimedOut => "timeout",
            _ => "I/O operation",
        }
        .to_string();

        Self::Io {
            path: PathBuf::from("unknown"),
            operation,
            source: Some(Box::new(err)),
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::TomlParsing {
            context: err.message().to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<bincode::error::EncodeError> for AppError {
    fn from(err: bincode::error::EncodeError) -> Self {
        Self::Serialization {
            message: format!("failed to encode message: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<bincode::error::DecodeError> for AppError {
    fn from(err: bincode::error::DecodeError) -> Self {
        Self::Serialization {
            message: format!("failed to decode message: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AppError::config("test config error");
        assert_eq!(err.to_string(), "Configuration error: test config error");
    }

    #[test]
    fn test_missing_file_message() {
        let err = AppError::missing_file("root ca certificate", "/sslcerts/ca.cer");
        assert_eq!(
            err.to_string(),
            "Could not find root ca certificate file. (/sslcerts/ca.cer)"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(AppError::config("test").category(), "config");
        let queue_err: AppError = QueueError::QueueFull { capacity: 100 }.into();
        assert_eq!(queue_err.category(), "queue");
        assert!(!queue_err.is_fatal());
    }

    #[test]
    fn test_daemon_and_ipc_categories() {
        let err = AppError::daemon("already listening");
        assert_eq!(err.to_string(), "Daemon error: already listening");
        assert_eq!(err.category(), "daemon");

        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = AppError::ipc_with_source("Failed to write message length", io_err);
        assert_eq!(err.category(), "ipc");
        assert!(std::error::Error::source(&err).is_some());

        assert_eq!(AppError::internal("task panicked").category(), "internal");
        assert!(!AppError::internal("task panicked").is_fatal());
    }

    #[test]
    fn test_bincode_decode_conversion() {
        let result: Result<(String, usize), _> =
            bincode::serde::decode_from_slice(&[0xFF], bincode::config::standard());
        let err: AppError = result.unwrap_err().into();
        assert_eq!(err.category(), "serialization");
        assert!(err.to_string().starts_with("Serialization error: failed to decode message"));
    }

    #[test]
    fn test_retryable_errors() {
        let transport: AppError = TransportError::Timeout {
            operation: "TLS handshake".into(),
        }
        .into();
        assert!(transport.is_retryable());
        assert!(!AppError::config("test").is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();

        match app_err {
            AppError::Io { operation, .. } => {
                assert_eq!(operation, "file not found");
            }
            _ => panic!("Wrong error type"),
        }
    }
}
