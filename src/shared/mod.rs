//! Modules shared by the producer CLI and the daemon
//!
//! Both sides agree on the settings file layout and on the IPC client used
//! to reach a running daemon.

pub mod config;
pub mod ipc;
