//! Push notification relay
//!
//! A long-running daemon keeps one TLS session open to the push gateway,
//! collects notifications from short-lived producers through a bounded
//! in-memory queue, and flushes the queue to the gateway on a fixed tick.
//! An on-demand listener drains the feedback service of expired tokens.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod errors;
pub mod gateway;
pub mod protocol;
pub mod queue;
pub mod shared;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigManager};
pub use errors::{AppError, AppResult};
pub use queue::{DeviceToken, PayloadEntry, QueueError, SharedQueue};
