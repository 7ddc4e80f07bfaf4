//! Byte codec for the persisted record
//!
//! Records are stored as JSON documents with RFC 3339 timestamps and
//! float-second durations. Decoding tolerates unknown fields so newer
//! writers stay readable by older readers.

use super::TimerRecord;
use crate::error::Result;

/// Serialize a record to the byte form handed to the key-value backend
pub fn encode(record: &TimerRecord) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode a record from stored bytes
pub fn decode(bytes: &[u8]) -> Result<TimerRecord> {
    Ok(serde_json::from_slice(bytes)?)
}
