//! Receive Frame Engine
//!
//! Owns the receive ring and the transfer engine feeding it. Each
//! [`FrameEngine::poll`] reconciles the hardware write cursor, runs the
//! active framing strategy over a snapshot of unread bytes, queues the
//! completed frames and discards what the strategy consumed.

use crate::config::FramingConfig;
use crate::error::FramerError;
use crate::frame::RawFrame;
use crate::hal::{RxDma, TickSource};
use crate::notifier::CompletionNotifier;
use crate::queue::FrameQueue;
use crate::strategy::{build_strategy, FramingMode, FramingStrategy};
use ring_buffer::{RingStats, RingStore, WriteAdvance};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Receive counters since the engine was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxStats {
    /// Poll cycles run
    pub polls: u64,
    /// Frames completed
    pub frames: u64,
    /// Payload bytes handed out in frames
    pub bytes_framed: u64,
    /// Ring bytes consumed by framing, markers and noise included
    pub bytes_consumed: u64,
    /// Bytes overwritten before they were framed
    pub overrun_bytes: u64,
    /// Frames lost to the queue overflow policy
    pub queue_drops: u64,
}

/// DMA-fed frame extraction engine
pub struct FrameEngine<D: RxDma, C: TickSource> {
    ring: RingStore,
    dma: D,
    clock: C,
    config: FramingConfig,
    strategy: Box<dyn FramingStrategy>,
    queue: FrameQueue,
    notifier: CompletionNotifier,
    /// Snapshot area, one ring's worth
    scratch: Box<[u8]>,
    stats: RxStats,
    faulted: bool,
}

impl<D: RxDma, C: TickSource> FrameEngine<D, C> {
    /// Allocate the ring for `config` and start the receive transfer into it
    pub fn new(config: FramingConfig, mut dma: D, clock: C) -> Result<Self, FramerError> {
        let capacity = config.ring_capacity();
        let mut ring = RingStore::new(capacity)?;
        dma.start(ring.dma_buffer_mut())?;

        let strategy = build_strategy(&config);
        info!(capacity, mode = ?strategy.mode(), "Receive engine started");

        Ok(Self {
            ring,
            dma,
            clock,
            queue: FrameQueue::new(config.queue_capacity, config.queue_overflow),
            strategy,
            config,
            notifier: CompletionNotifier::new(),
            scratch: vec![0u8; capacity].into_boxed_slice(),
            stats: RxStats::default(),
            faulted: false,
        })
    }

    fn ensure_running(&self) -> Result<(), FramerError> {
        if self.faulted {
            return Err(FramerError::Faulted);
        }
        Ok(())
    }

    /// Pull the hardware write cursor forward, returning the bytes that arrived
    pub fn refresh(&mut self) -> Result<u64, FramerError> {
        self.ensure_running()?;
        Ok(self.sync_write_cursor().arrived)
    }

    fn sync_write_cursor(&mut self) -> WriteAdvance {
        let snapshot = self.dma.sync(self.ring.dma_buffer_mut());
        let advance = self.ring.reconcile(snapshot.remaining, snapshot.laps);
        if advance.overrun > 0 {
            self.stats.overrun_bytes += advance.overrun;
            warn!(
                lost = advance.overrun,
                capacity = self.ring.capacity(),
                "Receive ring overrun, oldest bytes lost"
            );
        }
        advance
    }

    /// Run one extraction cycle, returning the number of frames completed
    pub fn poll(&mut self) -> Result<usize, FramerError> {
        self.ensure_running()?;
        self.stats.polls += 1;
        self.sync_write_cursor();

        if self.strategy.mode() == FramingMode::None || self.ring.is_empty() {
            return Ok(0);
        }

        let len = self.ring.peek(&mut self.scratch);
        let snapshot = &self.scratch[..len];
        let now = self.clock.now_ms();

        let queue = &mut self.queue;
        let stats = &mut self.stats;
        let mut completed = 0;
        let consumed = self.strategy.extract(snapshot, &mut |payload| {
            if queue.push(RawFrame::new(payload.to_vec(), now)).is_some() {
                stats.queue_drops += 1;
                warn!(queued = queue.len(), "Frame queue full, frame dropped");
            }
            stats.frames += 1;
            stats.bytes_framed += payload.len() as u64;
            completed += 1;
        });

        self.ring.pop(consumed);
        self.stats.bytes_consumed += consumed as u64;

        if consumed == 0 && self.ring.is_full() {
            warn!(
                capacity = self.ring.capacity(),
                "Receive ring full without a frame boundary"
            );
        }

        if completed > 0 {
            debug!(completed, consumed, "Frames extracted");
            self.notifier.notify(completed);
        }
        Ok(completed)
    }

    /// Change the fixed frame length, resizing the ring if the new length needs it.
    ///
    /// A resize stops the transfer, carries unread bytes into the new ring
    /// and restarts the transfer. If the restart fails the engine is faulted
    /// and the error is returned here.
    pub fn set_expected_length(&mut self, length: usize) -> Result<(), FramerError> {
        self.ensure_running()?;
        self.config.expected_length = length;

        let required = self.config.ring_capacity();
        if required != self.ring.capacity() {
            self.resize(required)?;
        }
        self.reselect();
        Ok(())
    }

    pub fn set_start_marker(&mut self, marker: &[u8]) {
        self.config.start_marker = marker.to_vec();
        self.reselect();
    }

    pub fn set_end_marker(&mut self, marker: &[u8]) {
        self.config.end_marker = marker.to_vec();
        self.reselect();
    }

    /// Bound the marker search done per poll (0 = unbounded)
    pub fn set_max_search_depth(&mut self, depth: usize) {
        self.config.max_search_depth = depth;
        self.reselect();
    }

    /// Disable all framing; buffered bytes stay for manual draining
    pub fn clear_framing(&mut self) {
        self.config.expected_length = 0;
        self.config.start_marker.clear();
        self.config.end_marker.clear();
        self.reselect();
    }

    /// Replace the whole configuration
    pub fn apply_config(&mut self, config: FramingConfig) -> Result<(), FramerError> {
        self.ensure_running()?;
        let required = config.ring_capacity();
        let evicted = self
            .queue
            .set_limits(config.queue_capacity, config.queue_overflow);
        if evicted > 0 {
            self.stats.queue_drops += evicted as u64;
            warn!(evicted, "Frame queue shrunk, oldest frames dropped");
        }
        self.config = config;

        if required != self.ring.capacity() {
            self.resize(required)?;
        }
        self.reselect();
        Ok(())
    }

    fn reselect(&mut self) {
        let previous = self.strategy.mode();
        self.strategy = build_strategy(&self.config);
        if self.strategy.mode() != previous {
            info!(from = ?previous, to = ?self.strategy.mode(), "Framing mode changed");
        }
    }

    fn resize(&mut self, capacity: usize) -> Result<(), FramerError> {
        self.sync_write_cursor();
        self.dma.stop();
        // Bytes that landed between the last sync and the stop
        self.sync_write_cursor();

        let mut unread = vec![0u8; self.ring.len()];
        self.ring.peek(&mut unread);
        if unread.len() > capacity {
            warn!(
                dropped = unread.len() - capacity,
                "Shrinking receive ring drops oldest unread bytes"
            );
        }

        self.ring = RingStore::with_carryover(capacity, &unread)?;
        self.scratch = vec![0u8; capacity].into_boxed_slice();

        if let Err(e) = self.dma.start(self.ring.dma_buffer_mut()) {
            self.faulted = true;
            error!(capacity, "Receive transfer failed to restart: {}", e);
            return Err(FramerError::Reconfigure(e));
        }

        info!(capacity, carried = unread.len().min(capacity), "Receive ring resized");
        Ok(())
    }

    /// Restart the transfer after a failed reconfiguration
    pub fn recover(&mut self) -> Result<(), FramerError> {
        if !self.faulted {
            return Ok(());
        }

        let unread = {
            let mut buf = vec![0u8; self.ring.len()];
            self.ring.peek(&mut buf);
            buf
        };
        self.ring = RingStore::with_carryover(self.ring.capacity(), &unread)?;
        self.dma.start(self.ring.dma_buffer_mut())?;
        self.faulted = false;
        self.reselect();
        info!(capacity = self.ring.capacity(), "Receive engine recovered");
        Ok(())
    }

    /// Oldest completed frame
    pub fn pull_frame(&mut self) -> Result<RawFrame, FramerError> {
        self.queue.pop()
    }

    pub fn front_frame(&self) -> Option<&RawFrame> {
        self.queue.front()
    }

    pub fn pending_frame_count(&self) -> usize {
        self.queue.len()
    }

    pub fn set_completion_callback<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.notifier.set(callback);
    }

    pub fn clear_completion_callback(&mut self) {
        self.notifier.clear();
    }

    /// Copy unread bytes without consuming them
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        self.ring.peek(buf)
    }

    /// Copy and consume unread bytes
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.ring.read(buf)
    }

    /// Discard `count` unread bytes
    pub fn pop(&mut self, count: usize) -> usize {
        self.ring.pop(count)
    }

    /// Unread bytes as of the last refresh
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    /// Drop every unread byte, resynchronizing on the write cursor
    pub fn flush(&mut self) -> Result<(), FramerError> {
        self.ring.set_read_pos(self.ring.write_pos())?;
        Ok(())
    }

    pub fn mode(&self) -> FramingMode {
        self.strategy.mode()
    }

    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    pub fn stats(&self) -> RxStats {
        self.stats
    }

    pub fn ring_stats(&self) -> RingStats {
        self.ring.stats()
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn dma(&self) -> &D {
        &self.dma
    }

    pub fn dma_mut(&mut self) -> &mut D {
        &mut self.dma
    }
}

impl<D: RxDma, C: TickSource> Drop for FrameEngine<D, C> {
    fn drop(&mut self) {
        info!("Stopping receive transfer");
        self.dma.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{DmaFeed, ManualClock, SoftDma};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn engine(config: FramingConfig) -> (FrameEngine<SoftDma, ManualClock>, DmaFeed, ManualClock) {
        let dma = SoftDma::new();
        let feed = dma.feed();
        let clock = ManualClock::new();
        let engine = FrameEngine::new(config, dma, clock.clone()).unwrap();
        (engine, feed, clock)
    }

    fn drain(engine: &mut FrameEngine<SoftDma, ManualClock>) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Ok(frame) = engine.pull_frame() {
            frames.push(frame.into_payload());
        }
        frames
    }

    #[test]
    fn test_fixed_length_poll() {
        let (mut engine, feed, _) = engine(FramingConfig::fixed_length(4));
        feed.push(b"0123456789abc");

        assert_eq!(engine.poll().unwrap(), 3);
        assert_eq!(engine.pending_frame_count(), 3);
        assert_eq!(engine.buffered(), 1);
        assert_eq!(drain(&mut engine), vec![b"0123".to_vec(), b"4567".to_vec(), b"89ab".to_vec()]);
    }

    #[test]
    fn test_start_marker_poll() {
        let (mut engine, feed, _) = engine(FramingConfig::start_marker(b"\x01\x02"));
        feed.push(b"\x01\x02AB\x01\x02CD\x01\x02");

        assert_eq!(engine.poll().unwrap(), 2);
        assert_eq!(drain(&mut engine), vec![b"AB".to_vec(), b"CD".to_vec()]);

        let mut rest = [0u8; 8];
        assert_eq!(engine.peek(&mut rest), 2);
        assert_eq!(&rest[..2], b"\x01\x02");
    }

    #[test]
    fn test_end_marker_poll() {
        let (mut engine, feed, _) = engine(FramingConfig::end_marker(b"\x03\x04"));
        feed.push(b"AB\x03\x04CD\x03\x04");

        assert_eq!(engine.poll().unwrap(), 2);
        assert_eq!(drain(&mut engine), vec![b"AB".to_vec(), b"CD".to_vec()]);
        assert_eq!(engine.buffered(), 0);
    }

    #[test]
    fn test_delimited_poll() {
        let (mut engine, feed, _) = engine(FramingConfig::delimited(b"<", b">"));
        feed.push(b"<AB><CD>");

        assert_eq!(engine.poll().unwrap(), 2);
        assert_eq!(drain(&mut engine), vec![b"AB".to_vec(), b"CD".to_vec()]);
    }

    #[test]
    fn test_frame_split_across_polls() {
        let (mut engine, feed, clock) = engine(FramingConfig::end_marker(b"\r\n"));
        feed.push(b"hel");
        assert_eq!(engine.poll().unwrap(), 0);

        clock.advance(40);
        feed.push(b"lo\r");
        assert_eq!(engine.poll().unwrap(), 0);

        feed.push(b"\n");
        assert_eq!(engine.poll().unwrap(), 1);
        let frame = engine.pull_frame().unwrap();
        assert_eq!(frame.payload(), b"hello");
        assert_eq!(frame.timestamp_ms(), 40);
    }

    #[test]
    fn test_bounded_search_one_frame_per_poll() {
        let config = FramingConfig {
            max_search_depth: 1,
            ..FramingConfig::end_marker(b";")
        };
        let (mut engine, feed, _) = engine(config);
        feed.push(b"a;b;c;");

        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(engine.poll().unwrap(), 0);
        assert_eq!(drain(&mut engine), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_no_configuration_passes_through() {
        let (mut engine, feed, _) = engine(FramingConfig::default());
        feed.push(b"<AB>\n0123\x01\x02");

        assert_eq!(engine.poll().unwrap(), 0);
        assert_eq!(engine.pending_frame_count(), 0);
        assert_eq!(engine.buffered(), 11);

        let mut buf = [0u8; 4];
        assert_eq!(engine.read(&mut buf), 4);
        assert_eq!(&buf, b"<AB>");
        assert_eq!(engine.pop(3), 3);
        assert_eq!(engine.buffered(), 4);
    }

    #[test]
    fn test_pull_from_empty_queue() {
        let (mut engine, _, _) = engine(FramingConfig::fixed_length(2));
        engine.poll().unwrap();
        assert!(matches!(engine.pull_frame(), Err(FramerError::NoFrameAvailable)));
    }

    #[test]
    fn test_callback_once_per_productive_poll() {
        let (mut engine, feed, _) = engine(FramingConfig::fixed_length(2));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        engine.set_completion_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        feed.push(b"aabbcc");
        engine.poll().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        engine.poll().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        engine.clear_completion_callback();
        feed.push(b"dd");
        engine.poll().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_setter_reselects_before_next_poll() {
        let (mut engine, feed, _) = engine(FramingConfig::default());
        feed.push(b"x;y;");
        engine.poll().unwrap();
        assert_eq!(engine.pending_frame_count(), 0);

        engine.set_end_marker(b";");
        assert_eq!(engine.mode(), FramingMode::EndMarker);
        assert_eq!(engine.poll().unwrap(), 2);

        engine.clear_framing();
        assert_eq!(engine.mode(), FramingMode::None);
    }

    #[test]
    fn test_resize_keeps_unread_bytes() {
        let (mut engine, feed, _) = engine(FramingConfig {
            buffer_capacity: 8,
            ..FramingConfig::default()
        });
        feed.push(b"abc");
        engine.poll().unwrap();
        feed.push(b"def");

        engine.set_expected_length(10).unwrap();
        assert_eq!(engine.ring_stats().capacity, 20);
        assert_eq!(engine.dma().start_count(), 2);

        feed.push(b"ghij");
        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(engine.pull_frame().unwrap().payload(), b"abcdefghij");
    }

    #[test]
    fn test_same_capacity_does_not_restart() {
        let (mut engine, _, _) = engine(FramingConfig::default());
        engine.set_expected_length(8).unwrap();
        assert_eq!(engine.dma().start_count(), 1);
        assert_eq!(engine.mode(), FramingMode::FixedLength);
    }

    #[test]
    fn test_failed_restart_faults_engine() {
        let (mut engine, feed, _) = engine(FramingConfig::default());
        feed.push(b"keep");
        engine.poll().unwrap();

        engine.dma_mut().fail_next_start();
        let err = engine.set_expected_length(1000).unwrap_err();
        assert!(matches!(err, FramerError::Reconfigure(_)));
        assert!(engine.is_faulted());
        assert!(matches!(engine.poll(), Err(FramerError::Faulted)));

        engine.recover().unwrap();
        assert!(!engine.is_faulted());
        assert_eq!(engine.buffered(), 4);
        feed.push(b"x".repeat(996).as_slice());
        assert_eq!(engine.poll().unwrap(), 1);
    }

    #[test]
    fn test_capacity_boundary_via_dma() {
        let (mut engine, feed, _) = engine(FramingConfig {
            buffer_capacity: 16,
            ..FramingConfig::default()
        });
        feed.push(&[0x55; 16]);
        engine.refresh().unwrap();
        assert_eq!(engine.buffered(), 16);
        assert_eq!(engine.stats().overrun_bytes, 0);
    }

    #[test]
    fn test_overrun_keeps_newest_tail() {
        let (mut engine, feed, _) = engine(FramingConfig {
            buffer_capacity: 8,
            ..FramingConfig::end_marker(b"\n")
        });
        feed.push(b"0123456789ab\n");
        engine.poll().unwrap();

        assert_eq!(engine.stats().overrun_bytes, 5);
        assert_eq!(engine.pull_frame().unwrap().payload(), b"56789ab");
    }

    #[test]
    fn test_queue_overflow_counted() {
        let (mut engine, feed, _) = engine(FramingConfig {
            queue_capacity: 2,
            ..FramingConfig::fixed_length(1)
        });
        feed.push(b"abcd");
        assert_eq!(engine.poll().unwrap(), 4);
        assert_eq!(engine.stats().queue_drops, 2);
        assert_eq!(drain(&mut engine), vec![b"c".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn test_flush_discards_buffered() {
        let (mut engine, feed, _) = engine(FramingConfig::default());
        feed.push(b"stale");
        engine.refresh().unwrap();
        engine.flush().unwrap();
        assert_eq!(engine.buffered(), 0);
    }

    #[test]
    fn test_conservation_across_polls() {
        let (mut engine, feed, _) = engine(FramingConfig {
            buffer_capacity: 32,
            ..FramingConfig::end_marker(b";")
        });
        let chunks: [&[u8]; 5] = [b"ab;c", b"de;;", b"fgh", b";ij;k", b"lm"];
        let mut written = 0;
        for chunk in chunks {
            feed.push(chunk);
            written += chunk.len() as u64;
            engine.poll().unwrap();
        }

        let stats = engine.stats();
        assert_eq!(stats.bytes_consumed + engine.buffered() as u64, written);
        assert_eq!(
            drain(&mut engine),
            vec![b"ab".to_vec(), b"cde".to_vec(), Vec::new(), b"fgh".to_vec(), b"ij".to_vec()]
        );
    }

    #[test]
    fn test_bounded_delimited_drains_over_polls() {
        let config = FramingConfig {
            max_search_depth: 1,
            ..FramingConfig::delimited(b"<", b">")
        };
        let (mut engine, feed, _) = engine(config);
        feed.push(b"<lost<A><B>x<C>");

        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(engine.front_frame().map(|f| f.payload()), Some(&b"A"[..]));
        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(engine.poll().unwrap(), 0);
        assert_eq!(engine.buffered(), 0);
        assert_eq!(drain(&mut engine), vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);

        engine.set_max_search_depth(2);
        feed.push(b"|<D><E><F>");
        assert_eq!(engine.poll().unwrap(), 2);
        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(drain(&mut engine), vec![b"D".to_vec(), b"E".to_vec(), b"F".to_vec()]);
    }

    #[test]
    fn test_same_start_and_end_marker_makes_progress() {
        let config = FramingConfig {
            max_search_depth: 1,
            ..FramingConfig::delimited(b"|", b"|")
        };
        let (mut engine, feed, _) = engine(config);
        feed.push(b"|AB|");

        assert_eq!(engine.poll().unwrap(), 1);
        assert_eq!(engine.buffered(), 0);
        assert_eq!(engine.pull_frame().unwrap().payload(), b"AB");
    }

    #[test]
    fn test_queue_shrink_counted_as_drops() {
        let (mut engine, feed, _) = engine(FramingConfig {
            queue_capacity: 0,
            ..FramingConfig::fixed_length(1)
        });
        feed.push(b"abcde");
        assert_eq!(engine.poll().unwrap(), 5);

        engine
            .apply_config(FramingConfig {
                queue_capacity: 2,
                ..FramingConfig::fixed_length(1)
            })
            .unwrap();
        assert_eq!(engine.stats().queue_drops, 3);
        assert_eq!(drain(&mut engine), vec![b"d".to_vec(), b"e".to_vec()]);
    }
}
