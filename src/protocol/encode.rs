//! Outbound request framing

use super::{CodecError, WireFormat};
use crate::queue::{PayloadEntry, DEVICE_TOKEN_LEN};

/// Command byte of a simple-format frame.
pub const SIMPLE_COMMAND: u8 = 0;

/// Command byte of a framed-format frame.
pub const FRAMED_COMMAND: u8 = 2;

/// Command (1) plus total length (4).
pub const FRAMED_HEADER_LEN: usize = 5;

/// Item marker (1) plus item length (2).
const ITEM_HEADER_LEN: usize = 3;

/// Identifier (4), expiration (4) and priority (1) following each payload.
const ITEM_TRAILER_LEN: usize = 9;

const EXPIRATION: u32 = 0;
const PRIORITY: u8 = 10;

fn payload_len(json: &str) -> Result<u16, CodecError> {
    u16::try_from(json.len()).map_err(|_| CodecError::PayloadLength(json.len()))
}

/// Encode one notification as a simple-format frame:
/// `0 | 32 (u16) | token | payload length (u16) | payload`.
pub fn encode_simple(entry: &PayloadEntry) -> Result<Vec<u8>, CodecError> {
    let payload = entry.json.as_bytes();
    let length = payload_len(&entry.json)?;

    let mut frame = Vec::with_capacity(1 + 2 + DEVICE_TOKEN_LEN + 2 + payload.len());
    frame.push(SIMPLE_COMMAND);
    frame.extend_from_slice(&(DEVICE_TOKEN_LEN as u16).to_be_bytes());
    frame.extend_from_slice(entry.device.as_bytes());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Encode a whole batch as one framed-format frame.
///
/// `identifier` is the session's notification counter; it is advanced once per
/// entry and the advanced value is written into that entry's item. The item
/// marker is the entry's position within the batch, which gateways keyed on a
/// constant item type may reject.
pub fn encode_framed(entries: &[PayloadEntry], identifier: &mut u32) -> Result<Vec<u8>, CodecError> {
    if entries.len() > usize::from(u8::MAX) + 1 {
        return Err(CodecError::BatchTooLarge(entries.len()));
    }

    let mut frame = Vec::with_capacity(FRAMED_HEADER_LEN + entries.len() * 300);
    frame.push(FRAMED_COMMAND);
    frame.extend_from_slice(&0u32.to_be_bytes());

    let mut total: u32 = 0;
    for (index, entry) in entries.iter().enumerate() {
        let payload = entry.json.as_bytes();
        let item_len = payload_len(&entry.json)?
            .checked_add((DEVICE_TOKEN_LEN + ITEM_TRAILER_LEN) as u16)
            .ok_or(CodecError::PayloadLength(payload.len()))?;

        *identifier = identifier.wrapping_add(1);

        frame.push(index as u8);
        frame.extend_from_slice(&item_len.to_be_bytes());
        frame.extend_from_slice(entry.device.as_bytes());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&identifier.to_be_bytes());
        frame.extend_from_slice(&EXPIRATION.to_be_bytes());
        frame.push(PRIORITY);

        total += (ITEM_HEADER_LEN + usize::from(item_len)) as u32;
    }

    frame[1..FRAMED_HEADER_LEN].copy_from_slice(&total.to_be_bytes());
    Ok(frame)
}

/// Encode a drained batch into the frames to write, in write order.
///
/// An empty batch produces no frames in either format.
pub fn encode_batch(
    format: WireFormat,
    entries: &[PayloadEntry],
    identifier: &mut u32,
) -> Result<Vec<Vec<u8>>, CodecError> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    match format {
        WireFormat::Simple => entries.iter().map(encode_simple).collect(),
        WireFormat::Framed => Ok(vec![encode_framed(entries, identifier)?]),
    }
}
