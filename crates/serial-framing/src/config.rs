//! Framing configuration

use crate::strategy::FramingMode;
use serde::{Deserialize, Serialize};

/// Default receive ring size in bytes
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Default marker occurrences located per poll
pub const DEFAULT_MAX_SEARCH_DEPTH: usize = 32;

/// Default frame queue bound
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Ring holds at least this many fixed-length frames
const FRAMES_PER_RING: usize = 2;

/// What the frame queue does when a frame arrives while it is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued frame
    #[default]
    DropOldest,
    /// Reject the incoming frame
    DropNewest,
}

/// Receive framing and transmit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Fixed frame length in bytes (0 = disabled)
    pub expected_length: usize,

    /// Marker opening each frame (empty = disabled)
    pub start_marker: Vec<u8>,

    /// Marker closing each frame (empty = disabled)
    pub end_marker: Vec<u8>,

    /// Marker occurrences located per poll, or frames closed per poll when
    /// both markers are set (0 = unbounded)
    pub max_search_depth: usize,

    /// Base receive ring size; grown to fit two fixed-length frames
    pub buffer_capacity: usize,

    /// Frames held before the overflow policy applies (0 = unbounded)
    pub queue_capacity: usize,

    /// Frame queue overflow behavior
    pub queue_overflow: OverflowPolicy,

    /// Transmit staging buffer size
    pub tx_buffer_capacity: usize,

    /// How long a fire-and-forget transmit waits for the previous one
    pub tx_ready_timeout_ms: u64,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            expected_length: 0,
            start_marker: Vec::new(),
            end_marker: Vec::new(),
            max_search_depth: DEFAULT_MAX_SEARCH_DEPTH,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_overflow: OverflowPolicy::DropOldest,
            tx_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            tx_ready_timeout_ms: 10,
        }
    }
}

impl FramingConfig {
    /// Frames of exactly `length` bytes
    pub fn fixed_length(length: usize) -> Self {
        Self {
            expected_length: length,
            ..Default::default()
        }
    }

    /// Frames introduced by `marker`
    pub fn start_marker(marker: &[u8]) -> Self {
        Self {
            start_marker: marker.to_vec(),
            ..Default::default()
        }
    }

    /// Frames terminated by `marker`
    pub fn end_marker(marker: &[u8]) -> Self {
        Self {
            end_marker: marker.to_vec(),
            ..Default::default()
        }
    }

    /// Frames enclosed between `start` and `end`
    pub fn delimited(start: &[u8], end: &[u8]) -> Self {
        Self {
            start_marker: start.to_vec(),
            end_marker: end.to_vec(),
            ..Default::default()
        }
    }

    /// Framing discipline this configuration selects
    pub fn mode(&self) -> FramingMode {
        FramingMode::select(self)
    }

    /// Receive ring size implied by this configuration
    pub fn ring_capacity(&self) -> usize {
        self.buffer_capacity
            .max(self.expected_length.saturating_mul(FRAMES_PER_RING))
            .max(1)
    }
}
