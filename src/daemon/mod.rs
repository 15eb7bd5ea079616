//! Daemon module
//!
//! This module provides:
//! - The Unix socket front end producers use to reach the queue
//! - The integrated daemon that owns the queue and the gateway connection
//! - The shutdown signal shared by every daemon task

pub mod ipc;
pub mod ipc_server;
pub mod server;
pub mod shared;
pub mod shutdown;

// Re-export commonly used types
pub use ipc::{create_socket_path, is_process_running, pid_file_path};
pub use ipc_server::IpcServer;
pub use server::ApnsDaemon;
pub use shared::{DaemonMessage, DaemonResponse};
pub use shutdown::{Shutdown, StopReason};
