//! Ring Store Error Types

use thiserror::Error;

/// Errors raised by the ring store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// A ring needs at least one byte of storage
    #[error("Ring capacity must be non-zero")]
    ZeroCapacity,

    /// Requested read position is not backed by retained bytes
    #[error("Read position {requested} outside retained window [{oldest}, {newest}]")]
    ReadPosOutOfWindow {
        requested: u64,
        oldest: u64,
        newest: u64,
    },
}
