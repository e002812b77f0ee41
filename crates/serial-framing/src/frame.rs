//! Extracted frame type

use serde::{Deserialize, Serialize};

/// One complete frame pulled out of the receive stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    payload: Vec<u8>,
    timestamp_ms: u64,
}

impl RawFrame {
    /// Create a frame completed at `timestamp_ms`
    pub fn new(payload: Vec<u8>, timestamp_ms: u64) -> Self {
        Self {
            payload,
            timestamp_ms,
        }
    }

    /// Frame bytes, markers excluded
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Monotonic tick at which the frame completed
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
