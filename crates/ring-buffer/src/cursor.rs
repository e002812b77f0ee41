//! Hardware Write-Cursor Reconciliation
//!
//! A circular DMA transfer exposes how many transfers remain before its
//! counter reloads. The reconciler turns successive counter readings into
//! the number of bytes that landed in between.

/// Tracks the last observed hardware write index of a circular transfer
#[derive(Debug, Clone)]
pub struct CursorReconciler {
    capacity: usize,
    last_index: usize,
}

impl CursorReconciler {
    /// Create a reconciler for a transfer of `capacity` bytes starting at index 0
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            last_index: 0,
        }
    }

    /// Convert a remaining-transfers reading into a buffer index.
    ///
    /// A reading of 0 means the counter is about to reload, which is index 0.
    /// Readings above the capacity cannot come from a correctly started
    /// transfer and are treated as a fresh reload as well.
    pub fn index_from_remaining(&self, remaining: usize) -> usize {
        if remaining == 0 || remaining >= self.capacity {
            0
        } else {
            self.capacity - remaining
        }
    }

    /// Reconcile a new counter reading, returning the bytes written since the last one.
    ///
    /// `laps` is the number of counter reloads observed since the previous
    /// reading (transfer-complete events). A backwards move of the index
    /// implies at least one reload even if none was reported.
    pub fn advance(&mut self, remaining: usize, laps: u32) -> u64 {
        let index = self.index_from_remaining(remaining);
        let laps = if index < self.last_index {
            laps.max(1)
        } else {
            laps
        };

        let delta = u64::from(laps) * self.capacity as u64 + index as u64 - self.last_index as u64;
        self.last_index = index;
        delta
    }

    /// Force the tracked index, used when software writes into the ring directly
    pub fn set_index(&mut self, index: usize) {
        self.last_index = index % self.capacity.max(1);
    }

    /// Last reconciled index
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    /// Transfer size in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_forward_progress() {
        let mut rec = CursorReconciler::new(16);
        assert_eq!(rec.advance(16, 0), 0);
        assert_eq!(rec.advance(12, 0), 4);
        assert_eq!(rec.advance(3, 0), 9);
        assert_eq!(rec.last_index(), 13);
    }

    #[test]
    fn test_wraparound_without_reported_lap() {
        let mut rec = CursorReconciler::new(16);
        rec.advance(4, 0); // index 12
        assert_eq!(rec.advance(14, 0), 6); // 12 -> 16 -> 2
        assert_eq!(rec.last_index(), 2);
    }

    #[test]
    fn test_counter_at_zero_is_reload() {
        let mut rec = CursorReconciler::new(8);
        rec.advance(3, 0); // index 5
        assert_eq!(rec.advance(0, 0), 3);
        assert_eq!(rec.last_index(), 0);
    }

    #[test]
    fn test_full_lap_needs_reported_reload() {
        let mut rec = CursorReconciler::new(8);
        rec.advance(5, 0); // index 3
        assert_eq!(rec.advance(5, 0), 0);
        assert_eq!(rec.advance(5, 1), 8);
        assert_eq!(rec.advance(7, 2), 16 + 1 - 3);
    }

    #[test]
    fn test_out_of_range_reading() {
        let mut rec = CursorReconciler::new(8);
        rec.advance(2, 0); // index 6
        assert_eq!(rec.advance(100, 0), 2);
        assert_eq!(rec.last_index(), 0);
    }

    proptest! {
        #[test]
        fn prop_sum_of_deltas_matches_bytes_moved(
            capacity in 1usize..64,
            steps in prop::collection::vec(0usize..200, 1..40),
        ) {
            let mut rec = CursorReconciler::new(capacity);
            let mut hw_pos = 0u64;
            let mut counted = 0u64;

            for step in steps {
                let before = hw_pos;
                hw_pos += step as u64;
                let laps = (hw_pos / capacity as u64 - before / capacity as u64) as u32;
                let index = (hw_pos % capacity as u64) as usize;
                let remaining = capacity - index;
                counted += rec.advance(remaining, laps);
            }

            prop_assert_eq!(counted, hw_pos);
        }
    }
}
