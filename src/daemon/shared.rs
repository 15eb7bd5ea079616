//! Messages exchanged between producers and the daemon over the local socket.

use serde::{Deserialize, Serialize};

use crate::gateway::ConnectionState;
use crate::protocol::FeedbackRecord;
use crate::queue::QueueError;

/// Request sent by a producer or the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DaemonMessage {
    /// Enqueue one payload for a hex-encoded device token
    Push { device: String, payload: String },
    Ping,
    Status,
    CheckFeedback,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DaemonResponse {
    Ok,
    /// The queue refused the payload
    Rejected(QueueError),
    Error(String),
    Status {
        queue_size: usize,
        capacity: usize,
        connection_state: ConnectionState,
        uptime_secs: u64,
    },
    Feedback(Vec<FeedbackRecord>),
}
