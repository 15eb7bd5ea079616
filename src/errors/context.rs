//! Error context enhancement utilities
//!
//! Adds an operation description, and optionally the file involved, to any
//! standard error while converting it into [`AppError`].

use super::types::AppError;
use std::path::PathBuf;

/// Extension trait for adding context to error types
pub trait ErrorContextExt<T> {
    /// Add operation context to the error
    fn with_context(self, operation: impl Into<String>) -> Result<T, AppError>;

    /// Add operation and file context
    fn in_file_operation(
        self,
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
    ) -> Result<T, AppError>;
}

impl<T, E> ErrorContextExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context(self, operation: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| {
            let operation = operation.into();
            AppError::Other {
                message: format!("{}: {}", operation, e),
                source: Some(Box::new(e)),
            }
        })
    }

    fn in_file_operation(
        self,
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
    ) -> Result<T, AppError> {
        self.map_err(|e| AppError::io_with_source(path, operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context_prefixes_message() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "boom",
        ));
        let err = result.with_context("writing frame").unwrap_err();
        assert_eq!(err.to_string(), "writing frame: boom");
    }

    #[test]
    fn test_in_file_operation_records_path() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        match result.in_file_operation("/etc/apnsd.toml", "read settings") {
            Err(AppError::Io { path, operation, .. }) => {
                assert_eq!(path, PathBuf::from("/etc/apnsd.toml"));
                assert_eq!(operation, "read settings");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
