//! Byte Ring Store Implementation

use crate::cursor::CursorReconciler;
use crate::error::RingError;
use crate::RingStats;

/// Outcome of advancing the write cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteAdvance {
    /// Bytes that arrived
    pub arrived: u64,
    /// Unread bytes overwritten because the ring was already full
    pub overrun: u64,
}

/// Fixed-capacity byte ring fed by a circular transfer.
///
/// Cursors are absolute byte counts; storage indices are the cursors modulo
/// the capacity. Unread bytes never exceed the capacity: when the producer
/// laps the reader, the read cursor is pushed forward to the oldest byte
/// still in storage.
pub struct RingStore {
    /// Pre-allocated storage, also the transfer target
    storage: Box<[u8]>,
    /// Absolute position one past the newest byte
    write_pos: u64,
    /// Absolute position of the next unread byte
    read_pos: u64,
    /// Hardware counter tracking
    reconciler: CursorReconciler,
    /// Bytes that ever arrived
    total_written: u64,
    /// Bytes lost to overruns
    overrun_bytes: u64,
}

impl RingStore {
    /// Create a new ring with the given capacity
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::ZeroCapacity);
        }

        Ok(Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            write_pos: 0,
            read_pos: 0,
            reconciler: CursorReconciler::new(capacity),
            total_written: 0,
            overrun_bytes: 0,
        })
    }

    /// Create a ring that already holds `unread` and whose hardware index is 0.
    ///
    /// Carried bytes occupy the tail of storage so a transfer restarted at
    /// index 0 appends right after them. If `unread` is larger than the
    /// capacity only its newest bytes are kept.
    pub fn with_carryover(capacity: usize, unread: &[u8]) -> Result<Self, RingError> {
        let mut ring = Self::new(capacity)?;
        let kept = &unread[unread.len().saturating_sub(capacity)..];

        let start = capacity - kept.len();
        ring.storage[start..].copy_from_slice(kept);
        ring.read_pos = start as u64;
        ring.write_pos = capacity as u64;
        Ok(ring)
    }

    fn index(&self, pos: u64) -> usize {
        (pos % self.storage.len() as u64) as usize
    }

    /// Copy up to `buf.len()` unread bytes into `buf` without consuming them
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.len());
        let start = self.index(self.read_pos);
        let first = count.min(self.storage.len() - start);

        buf[..first].copy_from_slice(&self.storage[start..start + first]);
        buf[first..count].copy_from_slice(&self.storage[..count - first]);
        count
    }

    /// Copy up to `buf.len()` unread bytes into `buf` and consume them
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let count = self.peek(buf);
        self.read_pos += count as u64;
        count
    }

    /// Discard up to `count` unread bytes, returning how many were discarded
    pub fn pop(&mut self, count: usize) -> usize {
        let count = count.min(self.len());
        self.read_pos += count as u64;
        count
    }

    /// Force the read cursor to an absolute position.
    ///
    /// The position must lie within the bytes still held in storage:
    /// between `write_pos - capacity` (or 0) and `write_pos`.
    pub fn set_read_pos(&mut self, pos: u64) -> Result<(), RingError> {
        let oldest = self.write_pos.saturating_sub(self.storage.len() as u64);
        if pos < oldest || pos > self.write_pos {
            return Err(RingError::ReadPosOutOfWindow {
                requested: pos,
                oldest,
                newest: self.write_pos,
            });
        }
        self.read_pos = pos;
        Ok(())
    }

    /// Reconcile the write cursor from the transfer's remaining-count register
    pub fn dma_counter(&mut self, remaining: usize) -> WriteAdvance {
        self.reconcile(remaining, 0)
    }

    /// Reconcile the write cursor from a counter reading plus observed reloads
    pub fn reconcile(&mut self, remaining: usize, laps: u32) -> WriteAdvance {
        let arrived = self.reconciler.advance(remaining, laps);
        self.advance_write(arrived)
    }

    /// Software producer path: append `data` as if the transfer engine wrote it
    pub fn write(&mut self, data: &[u8]) -> WriteAdvance {
        let capacity = self.storage.len();
        let skip = data.len().saturating_sub(capacity);
        let tail = &data[skip..];

        let start = self.index(self.write_pos + skip as u64);
        let first = tail.len().min(capacity - start);
        self.storage[start..start + first].copy_from_slice(&tail[..first]);
        self.storage[..tail.len() - first].copy_from_slice(&tail[first..]);

        let advance = self.advance_write(data.len() as u64);
        self.reconciler.set_index(self.index(self.write_pos));
        advance
    }

    fn advance_write(&mut self, arrived: u64) -> WriteAdvance {
        self.write_pos += arrived;
        self.total_written += arrived;

        let capacity = self.storage.len() as u64;
        let unread = self.write_pos - self.read_pos;
        let overrun = unread.saturating_sub(capacity);
        if overrun > 0 {
            self.read_pos += overrun;
            self.overrun_bytes += overrun;
        }

        WriteAdvance { arrived, overrun }
    }

    /// Mutable view of the storage, handed to the transfer engine as its target
    pub fn dma_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Get the number of unread bytes
    pub fn len(&self) -> usize {
        (self.write_pos - self.read_pos) as usize
    }

    /// Check if there is nothing to read
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the next arriving byte would overwrite an unread one
    pub fn is_full(&self) -> bool {
        self.len() == self.storage.len()
    }

    /// Get the ring capacity
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes that can arrive before an overrun
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }

    /// Absolute read cursor
    pub fn read_pos(&self) -> u64 {
        self.read_pos
    }

    /// Absolute write cursor
    pub fn write_pos(&self) -> u64 {
        self.write_pos
    }

    /// Get total bytes written (for statistics)
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Get total bytes lost to overruns
    pub fn overrun_bytes(&self) -> u64 {
        self.overrun_bytes
    }

    /// Discard every unread byte
    pub fn clear(&mut self) {
        self.read_pos = self.write_pos;
    }

    /// Snapshot of the ring counters
    pub fn stats(&self) -> RingStats {
        RingStats {
            capacity: self.capacity(),
            buffered: self.len(),
            total_written: self.total_written,
            overrun_bytes: self.overrun_bytes,
        }
    }
}
