//! Centralized error handling module
//!
//! Library code returns [`AppError`]; the CLI layer wraps it in
//! `anyhow::Error` with additional context.

pub mod context;
pub mod types;

pub use context::ErrorContextExt;
pub use types::{AppError, AppResult};

/// Convert from anyhow::Error to AppError at the library boundary
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Other {
            message: format!("{:#}", err),
            source: None,
        }
    }
}
