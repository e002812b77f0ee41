//! DMA Receive Ring
//!
//! Fixed-capacity byte storage with independent read and write cursors.
//! The write cursor is normally advanced by a hardware transfer engine and
//! reconciled from its down-counter; software drains bytes with
//! [`RingStore::peek`], [`RingStore::read`] and [`RingStore::pop`].

mod buffer;
mod cursor;
mod error;

pub use buffer::{RingStore, WriteAdvance};
pub use cursor::CursorReconciler;
pub use error::RingError;

use serde::{Deserialize, Serialize};

/// Point-in-time view of a ring's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingStats {
    /// Storage size in bytes
    pub capacity: usize,
    /// Unread bytes
    pub buffered: usize,
    /// Bytes that ever arrived
    pub total_written: u64,
    /// Bytes overwritten before software read them
    pub overrun_bytes: u64,
}
