//! Inbound gateway and feedback decoding

use super::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command byte of a gateway error response.
pub const ERROR_RESPONSE_COMMAND: u8 = 8;

/// Command (1), status (1), identifier (4).
pub const ERROR_RESPONSE_LEN: usize = 6;

/// Timestamp (4) plus token length (2).
const FEEDBACK_HEADER_LEN: usize = 6;

/// Status byte of a gateway error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    NoError,
    ProcessingError,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Shutdown,
    Unknown(u8),
}

impl From<u8> for StatusCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::NoError,
            1 => Self::ProcessingError,
            2 => Self::MissingDeviceToken,
            3 => Self::MissingTopic,
            4 => Self::MissingPayload,
            5 => Self::InvalidTokenSize,
            6 => Self::InvalidTopicSize,
            7 => Self::InvalidPayloadSize,
            8 => Self::InvalidToken,
            10 => Self::Shutdown,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => f.write_str("No errors"),
            Self::ProcessingError => f.write_str("Processing error"),
            Self::MissingDeviceToken => f.write_str("Missing device token"),
            Self::MissingTopic => f.write_str("Missing topic"),
            Self::MissingPayload => f.write_str("Missing payload"),
            Self::InvalidTokenSize => f.write_str("Invalid token size"),
            Self::InvalidTopicSize => f.write_str("Invalid topic size"),
            Self::InvalidPayloadSize => f.write_str("Invalid payload size"),
            Self::InvalidToken => f.write_str("Invalid token"),
            Self::Shutdown => f.write_str("Shutdown"),
            Self::Unknown(code) => write!(f, "Unknown error ({})", code),
        }
    }
}

/// A decoded 6-byte gateway reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    pub command: u8,
    pub status: StatusCode,
    pub identifier: u32,
}

impl ErrorResponse {
    /// Whether the command byte marks this as an error response.
    pub fn is_error_response(&self) -> bool {
        self.command == ERROR_RESPONSE_COMMAND
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error_response() {
            write!(f, "{} for id {}", self.status, self.identifier)
        } else {
            write!(f, "unknown command {}", self.command)
        }
    }
}

/// Decode exactly one error-response record.
pub fn decode_error_response(bytes: &[u8]) -> Result<ErrorResponse, CodecError> {
    let record: &[u8; ERROR_RESPONSE_LEN] =
        bytes.try_into().map_err(|_| CodecError::ResponseLength {
            expected: ERROR_RESPONSE_LEN,
            actual: bytes.len(),
        })?;

    Ok(ErrorResponse {
        command: record[0],
        status: StatusCode::from(record[1]),
        identifier: u32::from_be_bytes([record[2], record[3], record[4], record[5]]),
    })
}

/// One expired-token record from the feedback endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Seconds since the Unix epoch at which the token stopped being valid.
    pub timestamp: u32,
    pub token: Vec<u8>,
}

impl FeedbackRecord {
    pub fn token_hex(&self) -> String {
        hex::encode(&self.token)
    }
}

/// Decode a complete feedback stream.
///
/// Decoding stops at the end of the buffer. A record cut short, in its header
/// or its token, is an error rather than a partial result.
pub fn decode_feedback(bytes: &[u8]) -> Result<Vec<FeedbackRecord>, CodecError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < FEEDBACK_HEADER_LEN {
            return Err(CodecError::TruncatedFeedback {
                offset,
                needed: FEEDBACK_HEADER_LEN,
                available: rest.len(),
            });
        }

        let timestamp = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let token_len = usize::from(u16::from_be_bytes([rest[4], rest[5]]));
        let token = &rest[FEEDBACK_HEADER_LEN..];
        if token.len() < token_len {
            return Err(CodecError::TruncatedFeedback {
                offset,
                needed: FEEDBACK_HEADER_LEN + token_len,
                available: rest.len(),
            });
        }

        records.push(FeedbackRecord {
            timestamp,
            token: token[..token_len].to_vec(),
        });
        offset += FEEDBACK_HEADER_LEN + token_len;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_response() {
        let response = decode_error_response(&[0x08, 0x02, 0x00, 0x00, 0x00, 0x05]).unwrap();
        assert_eq!(response.command, 8);
        assert_eq!(response.status, StatusCode::MissingDeviceToken);
        assert_eq!(response.identifier, 5);
        assert!(response.is_error_response());
        assert_eq!(response.to_string(), "Missing device token for id 5");
    }

    #[test]
    fn test_status_code_table() {
        let expected = [
            (0, StatusCode::NoError),
            (1, StatusCode::ProcessingError),
            (2, StatusCode::MissingDeviceToken),
            (3, StatusCode::MissingTopic),
            (4, StatusCode::MissingPayload),
            (5, StatusCode::InvalidTokenSize),
            (6, StatusCode::InvalidTopicSize),
            (7, StatusCode::InvalidPayloadSize),
            (8, StatusCode::InvalidToken),
            (10, StatusCode::Shutdown),
            (9, StatusCode::Unknown(9)),
            (255, StatusCode::Unknown(255)),
        ];
        for (code, status) in expected {
            assert_eq!(StatusCode::from(code), status);
        }
        assert_eq!(StatusCode::Unknown(42).to_string(), "Unknown error (42)");
    }

    #[test]
    fn test_unrecognized_command() {
        let response = decode_error_response(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00]).unwrap();
        assert!(!response.is_error_response());
        assert_eq!(response.to_string(), "unknown command 1");
    }

    #[test]
    fn test_error_response_wrong_length() {
        assert_eq!(
            decode_error_response(&[0x08, 0x02]),
            Err(CodecError::ResponseLength { expected: 6, actual: 2 })
        );
    }

    #[test]
    fn test_decode_feedback_single_record() {
        let records =
            decode_feedback(&[0x00, 0x00, 0x00, 0x64, 0x00, 0x04, 0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        assert_eq!(
            records,
            vec![FeedbackRecord {
                timestamp: 100,
                token: vec![0xAA, 0xBB, 0xCC, 0xDD],
            }]
        );
        assert_eq!(records[0].token_hex(), "aabbccdd");
    }

    #[test]
    fn test_decode_feedback_multiple_records() {
        let mut stream = Vec::new();
        for (ts, token) in [(1u32, vec![1u8; 32]), (2, vec![2u8; 32])] {
            stream.extend_from_slice(&ts.to_be_bytes());
            stream.extend_from_slice(&(token.len() as u16).to_be_bytes());
            stream.extend_from_slice(&token);
        }

        let records = decode_feedback(&stream).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].timestamp, 2);
        assert_eq!(records[1].token, vec![2u8; 32]);
    }

    #[test]
    fn test_decode_feedback_empty_stream() {
        assert!(decode_feedback(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_feedback_truncated_token() {
        let err = decode_feedback(&[0x00, 0x00, 0x00, 0x64, 0x00, 0x04, 0xAA, 0xBB]).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedFeedback {
                offset: 0,
                needed: 10,
                available: 8,
            }
        );
    }

    #[test]
    fn test_decode_feedback_truncated_header() {
        let err = decode_feedback(&[0x00, 0x00, 0x00, 0x64, 0x00, 0x01, 0xAA, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedFeedback { offset: 7, .. }));
    }
}
