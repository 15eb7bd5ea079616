//! Bounded notification queue shared between producers and the dispatcher
//!
//! The queue is an arena of fixed-size slots plus an occupancy count, guarded
//! by a single coarse lock. Producers append one entry at a time; the
//! dispatcher drains the whole contents on every tick.
//!
//! Producers live in other processes and reach the queue through the daemon's
//! Unix socket (see [`crate::daemon::ipc_server`]); every access still goes
//! through the one lock below, so the socket front end never observes a
//! half-applied enqueue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Number of slots in the daemon's queue.
pub const QUEUE_CAPACITY: usize = 100;

/// Raw length of a device token.
pub const DEVICE_TOKEN_LEN: usize = 32;

/// Length of a device token in its hexadecimal representation.
pub const DEVICE_TOKEN_HEX_LEN: usize = DEVICE_TOKEN_LEN * 2;

/// Bytes reserved per slot for the JSON payload, including the terminator.
pub const PAYLOAD_SLOT_LEN: usize = 257;

/// Largest accepted payload, in encoded bytes.
pub const MAX_PAYLOAD_LEN: usize = PAYLOAD_SLOT_LEN - 2;

/// Errors reported to a single producer. They never affect the daemon.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueError {
    #[error("Payload queue is full ({capacity} entries)")]
    QueueFull { capacity: usize },

    #[error("Invalid device identifier: {reason}")]
    InvalidToken { reason: String },

    #[error("Payload is too large ({size} bytes, limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },
}

impl QueueError {
    /// Process exit code the producer CLI uses for this rejection
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::QueueFull { .. } => 2,
            Self::InvalidToken { .. } => 3,
            Self::PayloadTooLarge { .. } => 4,
        }
    }
}

/// A 32-byte device token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceToken([u8; DEVICE_TOKEN_LEN]);

impl DeviceToken {
    /// Decode a token from its 64-character hexadecimal form.
    pub fn from_hex(hex_str: &str) -> Result<Self, QueueError> {
        if hex_str.len() != DEVICE_TOKEN_HEX_LEN {
            return Err(QueueError::InvalidToken {
                reason: format!(
                    "expected {} hex characters, got {}",
                    DEVICE_TOKEN_HEX_LEN,
                    hex_str.len()
                ),
            });
        }

        let mut bytes = [0u8; DEVICE_TOKEN_LEN];
        hex::decode_to_slice(hex_str, &mut bytes).map_err(|e| QueueError::InvalidToken {
            reason: e.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Build a token from raw bytes, rejecting any length other than 32.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, QueueError> {
        let array: [u8; DEVICE_TOKEN_LEN] =
            bytes.try_into().map_err(|_| QueueError::InvalidToken {
                reason: format!("expected {} bytes, got {}", DEVICE_TOKEN_LEN, bytes.len()),
            })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; DEVICE_TOKEN_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceToken({})", self.to_hex())
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One pending notification, as handed to the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    pub device: DeviceToken,
    pub json: String,
}

struct Slot {
    device: [u8; DEVICE_TOKEN_LEN],
    json: [u8; PAYLOAD_SLOT_LEN],
    json_len: usize,
}

impl Slot {
    const EMPTY: Slot = Slot {
        device: [0; DEVICE_TOKEN_LEN],
        json: [0; PAYLOAD_SLOT_LEN],
        json_len: 0,
    };
}

struct Slots {
    entries: Box<[Slot]>,
    size: usize,
}

/// Fixed-capacity queue of pending notifications.
pub struct SharedQueue {
    slots: Mutex<Slots>,
}

impl SharedQueue {
    /// Create the daemon queue with [`QUEUE_CAPACITY`] zeroed slots.
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let entries = (0..capacity).map(|_| Slot::EMPTY).collect::<Vec<_>>();
        Self {
            slots: Mutex::new(Slots {
                entries: entries.into_boxed_slice(),
                size: 0,
            }),
        }
    }

    // A panicking holder cannot leave a slot half-written: size is only
    // bumped after the copy completes.
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one notification. Fails fast instead of waiting for space.
    pub fn enqueue(&self, device: &[u8], json: &str) -> Result<(), QueueError> {
        let device = DeviceToken::from_bytes(device)?;
        self.enqueue_token(device, json)
    }

    /// Append one notification whose token is still in hexadecimal form.
    pub fn enqueue_hex(&self, device_hex: &str, json: &str) -> Result<(), QueueError> {
        let device = DeviceToken::from_hex(device_hex)?;
        self.enqueue_token(device, json)
    }

    pub fn enqueue_token(&self, device: DeviceToken, json: &str) -> Result<(), QueueError> {
        let payload = json.as_bytes();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(QueueError::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_PAYLOAD_LEN,
            });
        }

        let mut slots = self.lock();
        let capacity = slots.entries.len();
        if slots.size >= capacity {
            return Err(QueueError::QueueFull { capacity });
        }

        let index = slots.size;
        let slot = &mut slots.entries[index];
        slot.device.copy_from_slice(device.as_bytes());
        slot.json[..payload.len()].copy_from_slice(payload);
        slot.json[payload.len()..].fill(0);
        slot.json_len = payload.len();
        slots.size = index + 1;
        Ok(())
    }

    /// Remove and return every pending entry in insertion order.
    ///
    /// Payload bytes are zeroed in the arena as they are copied out.
    pub fn drain_all(&self) -> Vec<PayloadEntry> {
        let mut slots = self.lock();
        if slots.size == 0 {
            return Vec::new();
        }

        let size = slots.size;
        let mut drained = Vec::with_capacity(size);
        for slot in slots.entries[..size].iter_mut() {
            let json = String::from_utf8_lossy(&slot.json[..slot.json_len]).into_owned();
            drained.push(PayloadEntry {
                device: DeviceToken(slot.device),
                json,
            });
            slot.json.fill(0);
            slot.json_len = 0;
        }
        slots.size = 0;
        drained
    }
}

impl Default for SharedQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn token(seed: u8) -> [u8; DEVICE_TOKEN_LEN] {
        let mut bytes = [0u8; DEVICE_TOKEN_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = seed.wrapping_add(i as u8);
        }
        bytes
    }

    #[test]
    fn test_enqueue_then_drain_preserves_order() {
        let queue = SharedQueue::new();
        for i in 0..5u8 {
            queue.enqueue(&token(i), &format!("{{\"n\":{}}}", i)).unwrap();
        }

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 5);
        for (i, entry) in drained.iter().enumerate() {
            assert_eq!(entry.device.as_bytes(), &token(i as u8));
            assert_eq!(entry.json, format!("{{\"n\":{}}}", i));
        }

        assert!(queue.drain_all().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_boundary() {
        let queue = SharedQueue::new();
        for i in 0..QUEUE_CAPACITY {
            queue.enqueue(&token(i as u8), "{}").unwrap();
        }

        let err = queue.enqueue(&token(0), "{}").unwrap_err();
        assert_eq!(err, QueueError::QueueFull { capacity: QUEUE_CAPACITY });
        assert_eq!(queue.len(), QUEUE_CAPACITY);
        assert_eq!(queue.drain_all().len(), QUEUE_CAPACITY);
    }

    #[test]
    fn test_payload_boundary() {
        let queue = SharedQueue::new();
        assert!(queue.enqueue(&token(1), &"a".repeat(255)).is_ok());

        let err = queue.enqueue(&token(1), &"a".repeat(256)).unwrap_err();
        assert!(matches!(err, QueueError::PayloadTooLarge { size: 256, .. }));

        // Multi-byte characters count by encoded length
        let err = queue.enqueue(&token(1), &"é".repeat(128)).unwrap_err();
        assert!(matches!(err, QueueError::PayloadTooLarge { size: 256, .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let queue = SharedQueue::new();
        assert!(matches!(
            queue.enqueue(&[0u8; 31], "{}"),
            Err(QueueError::InvalidToken { .. })
        ));
        assert!(matches!(
            queue.enqueue_hex("abcd", "{}"),
            Err(QueueError::InvalidToken { .. })
        ));
        assert!(matches!(
            queue.enqueue_hex(&"zz".repeat(32), "{}"),
            Err(QueueError::InvalidToken { .. })
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_hex_token_round_trip() {
        let hex_str = "00".repeat(16) + &"ff".repeat(16);
        let token = DeviceToken::from_hex(&hex_str).unwrap();
        assert_eq!(token.as_bytes()[0], 0x00);
        assert_eq!(token.as_bytes()[31], 0xff);
        assert_eq!(token.to_hex(), hex_str);
    }

    #[test]
    fn test_drain_does_not_leak_previous_payload() {
        let queue = SharedQueue::with_capacity(2);
        queue.enqueue(&token(1), "{\"long\":\"payload\"}").unwrap();
        queue.drain_all();

        queue.enqueue(&token(2), "{}").unwrap();
        let drained = queue.drain_all();
        assert_eq!(drained[0].json, "{}");
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let full = QueueError::QueueFull { capacity: 1 };
        let token = QueueError::InvalidToken { reason: String::new() };
        let size = QueueError::PayloadTooLarge { size: 300, limit: 255 };
        assert_eq!(full.exit_code(), 2);
        assert_eq!(token.exit_code(), 3);
        assert_eq!(size.exit_code(), 4);
    }

    #[test]
    fn test_concurrent_producers_and_drainer() {
        let queue = Arc::new(SharedQueue::new());
        let producers: Vec<_> = (0..4u8)
            .map(|p| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    let mut accepted = 0usize;
                    for _ in 0..200 {
                        if queue.enqueue(&token(p), &format!("{{\"p\":{}}}", p)).is_ok() {
                            accepted += 1;
                        }
                    }
                    accepted
                })
            })
            .collect();

        let mut drained = Vec::new();
        while producers.iter().any(|h| !h.is_finished()) {
            drained.extend(queue.drain_all());
        }
        let accepted: usize = producers.into_iter().map(|h| h.join().unwrap()).sum();
        drained.extend(queue.drain_all());

        assert_eq!(drained.len(), accepted);
        for entry in &drained {
            let p = entry.device.as_bytes()[0];
            assert_eq!(entry.json, format!("{{\"p\":{}}}", p));
        }
    }
}
