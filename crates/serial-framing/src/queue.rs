//! Bounded FIFO of extracted frames

use crate::config::OverflowPolicy;
use crate::error::FramerError;
use crate::frame::RawFrame;
use std::collections::VecDeque;

/// Frames waiting for the application, oldest first
#[derive(Debug)]
pub struct FrameQueue {
    frames: VecDeque<RawFrame>,
    /// Maximum queued frames (0 = unbounded)
    capacity: usize,
    policy: OverflowPolicy,
    dropped: u64,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames (0 = unbounded)
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            policy,
            dropped: 0,
        }
    }

    /// Append a frame, returning the frame dropped to make room, if any
    pub fn push(&mut self, frame: RawFrame) -> Option<RawFrame> {
        if self.capacity == 0 || self.frames.len() < self.capacity {
            self.frames.push_back(frame);
            return None;
        }

        self.dropped += 1;
        match self.policy {
            OverflowPolicy::DropOldest => {
                let evicted = self.frames.pop_front();
                self.frames.push_back(frame);
                evicted
            }
            OverflowPolicy::DropNewest => Some(frame),
        }
    }

    /// Oldest queued frame
    pub fn front(&self) -> Option<&RawFrame> {
        self.frames.front()
    }

    /// Remove and return the oldest queued frame
    pub fn pop(&mut self) -> Result<RawFrame, FramerError> {
        self.frames.pop_front().ok_or(FramerError::NoFrameAvailable)
    }

    /// Change the bound and policy, evicting the oldest frames that no longer fit.
    ///
    /// Returns the number of frames evicted.
    pub fn set_limits(&mut self, capacity: usize, policy: OverflowPolicy) -> usize {
        self.capacity = capacity;
        self.policy = policy;
        if capacity == 0 || self.frames.len() <= capacity {
            return 0;
        }

        let evicted = self.frames.len() - capacity;
        self.frames.drain(..evicted);
        self.dropped += evicted as u64;
        evicted
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames lost to the overflow policy
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(byte: u8) -> RawFrame {
        RawFrame::new(vec![byte], byte as u64)
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = FrameQueue::new(4, OverflowPolicy::DropOldest);
        queue.push(frame(1));
        queue.push(frame(2));

        assert_eq!(queue.front().map(|f| f.payload()[0]), Some(1));
        assert_eq!(queue.pop().unwrap().payload(), &[1]);
        assert_eq!(queue.pop().unwrap().payload(), &[2]);
        assert!(matches!(queue.pop(), Err(FramerError::NoFrameAvailable)));
    }

    #[test]
    fn test_drop_oldest() {
        let mut queue = FrameQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(frame(1));
        queue.push(frame(2));
        let evicted = queue.push(frame(3));

        assert_eq!(evicted.map(|f| f.payload()[0]), Some(1));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop().unwrap().payload(), &[2]);
    }

    #[test]
    fn test_drop_newest() {
        let mut queue = FrameQueue::new(1, OverflowPolicy::DropNewest);
        queue.push(frame(1));
        let rejected = queue.push(frame(2));

        assert_eq!(rejected.map(|f| f.payload()[0]), Some(2));
        assert_eq!(queue.pop().unwrap().payload(), &[1]);
    }

    #[test]
    fn test_unbounded_grows() {
        let mut queue = FrameQueue::new(0, OverflowPolicy::DropOldest);
        for i in 0..100 {
            assert!(queue.push(frame(i)).is_none());
        }
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_shrinking_limits_evicts_oldest() {
        let mut queue = FrameQueue::new(0, OverflowPolicy::DropOldest);
        for i in 0..5 {
            queue.push(frame(i));
        }
        assert_eq!(queue.set_limits(2, OverflowPolicy::DropNewest), 3);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 3);
        assert_eq!(queue.pop().unwrap().payload(), &[3]);

        assert_eq!(queue.set_limits(0, OverflowPolicy::DropOldest), 0);
    }
}
