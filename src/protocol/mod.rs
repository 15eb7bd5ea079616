//! Gateway wire protocol
//!
//! This module provides:
//! - Request framing in the simple (command 0) and framed (command 2) formats
//! - Decoding of the 6-byte error response the gateway sends before closing
//! - Decoding of the feedback stream of expired device tokens
//!
//! All functions are pure; the connection manager owns the sockets.

pub mod decode;
pub mod encode;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use decode::{decode_error_response, decode_feedback, ErrorResponse, FeedbackRecord, StatusCode};
pub use encode::{encode_batch, encode_framed, encode_simple};

/// Outbound request format. The two variants are mutually exclusive for a
/// daemon instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// One frame per notification, no identifiers.
    #[default]
    Simple,
    /// One frame per drained batch, with per-notification identifiers.
    Framed,
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => f.write_str("simple"),
            Self::Framed => f.write_str("framed"),
        }
    }
}

/// Encoding and decoding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("error response must be {expected} bytes, got {actual}")]
    ResponseLength { expected: usize, actual: usize },

    #[error("truncated feedback record at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedFeedback {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("payload of {0} bytes does not fit the 2-byte length field")]
    PayloadLength(usize),

    #[error("batch of {0} notifications does not fit in one frame")]
    BatchTooLarge(usize),
}
