//! Media units fanned out to viewers
//!
//! This is designed to be cheap to clone due to `Bytes` reference counting,
//! so delivering one unit to N viewer queues never copies the payload.

use std::time::Duration;

use bytes::Bytes;

/// One timestamped chunk of encoded media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUnit {
    /// Index into the stream's codec sequence
    pub track: u8,
    /// Presentation timestamp relative to the start of the connection
    pub timestamp: Duration,
    /// Encoded payload (zero-copy via reference counting)
    pub payload: Bytes,
    /// Whether this unit starts a decodable sequence (video only)
    pub is_keyframe: bool,
}

impl MediaUnit {
    /// Create a unit on the given track
    pub fn new(track: u8, timestamp: Duration, payload: Bytes, is_keyframe: bool) -> Self {
        Self {
            track,
            timestamp,
            payload,
            is_keyframe,
        }
    }

    /// Create a video keyframe on track 0
    pub fn keyframe(timestamp: Duration, payload: Bytes) -> Self {
        Self::new(0, timestamp, payload, true)
    }

    /// Create a non-key video unit on track 0
    pub fn delta(timestamp: Duration, payload: Bytes) -> Self {
        Self::new(0, timestamp, payload, false)
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
