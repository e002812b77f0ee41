//! Hardware Seam
//!
//! Traits the engine uses to talk to the receive transfer engine, the
//! transmitter and the tick source, plus software implementations for
//! hosts and tests.

use crate::error::HalError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Transfer counter state read during a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaSnapshot {
    /// Transfers left before the counter reloads
    pub remaining: usize,
    /// Counter reloads (transfer-complete events) since the previous sync
    pub laps: u32,
}

/// A circular receive transfer writing into the ring's storage
pub trait RxDma {
    /// Start a circular transfer targeting `buffer`, beginning at index 0
    fn start(&mut self, buffer: &mut [u8]) -> Result<(), HalError>;

    /// Halt the transfer; the counter keeps its final value
    fn stop(&mut self);

    /// Make landed bytes visible in `buffer` and read the counter.
    ///
    /// Memory-mapped engines have already written `buffer` and only read
    /// their registers here.
    fn sync(&mut self, buffer: &mut [u8]) -> DmaSnapshot;
}

/// Transmit side of the serial peripheral
pub trait TxPort {
    /// Whether the previous transmission has finished
    fn is_ready(&mut self) -> bool;

    /// Begin sending `data` without waiting for completion
    fn start_send(&mut self, data: &[u8]) -> Result<(), HalError>;
}

/// Monotonic millisecond tick source
pub trait TickSource {
    fn now_ms(&self) -> u64;
}

/// Tick source backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Shared tick counter that advances by `step` on every read
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    step: u64,
}

impl ManualClock {
    /// Clock frozen at 0 until [`ManualClock::advance`] is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that moves forward `step` ms each time it is read
    pub fn stepping(step: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(0)),
            step,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TickSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Producer handle for a [`SoftDma`]
#[derive(Debug, Clone, Default)]
pub struct DmaFeed {
    pending: Arc<Mutex<VecDeque<u8>>>,
}

impl DmaFeed {
    /// Queue bytes for the transfer engine to land on its next sync
    pub fn push(&self, data: &[u8]) {
        lock(&self.pending).extend(data.iter().copied());
    }

    /// Bytes not yet landed
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }
}

/// Software circular transfer engine.
///
/// Bytes pushed through its [`DmaFeed`] are written into the target buffer
/// on each sync, moving a down-counter exactly as a hardware channel would.
/// Bytes pushed while the transfer is stopped wait for the next start.
#[derive(Debug, Default)]
pub struct SoftDma {
    feed: DmaFeed,
    capacity: usize,
    index: usize,
    running: bool,
    fail_next_start: bool,
    starts: usize,
}

impl SoftDma {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for pushing received bytes
    pub fn feed(&self) -> DmaFeed {
        self.feed.clone()
    }

    /// Make the next `start` call fail
    pub fn fail_next_start(&mut self) {
        self.fail_next_start = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Successful starts so far
    pub fn start_count(&self) -> usize {
        self.starts
    }

    fn remaining(&self) -> usize {
        self.capacity - self.index
    }
}

impl RxDma for SoftDma {
    fn start(&mut self, buffer: &mut [u8]) -> Result<(), HalError> {
        if self.fail_next_start {
            self.fail_next_start = false;
            self.running = false;
            return Err(HalError::Start("transfer engine rejected restart".to_string()));
        }

        self.capacity = buffer.len();
        self.index = 0;
        self.running = true;
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn sync(&mut self, buffer: &mut [u8]) -> DmaSnapshot {
        let mut laps = 0;
        if self.running && self.capacity > 0 {
            let mut pending = lock(&self.feed.pending);
            for byte in pending.drain(..) {
                buffer[self.index] = byte;
                self.index += 1;
                if self.index == self.capacity {
                    self.index = 0;
                    laps += 1;
                }
            }
        }

        DmaSnapshot {
            remaining: self.remaining(),
            laps,
        }
    }
}

/// Record of everything a [`LoopbackTx`] sent
#[derive(Debug, Clone, Default)]
pub struct TxLog {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TxLog {
    /// Every transmission so far, oldest first
    pub fn frames(&self) -> Vec<Vec<u8>> {
        lock(&self.sent).clone()
    }
}

/// Transmitter that records what it sends and stays busy for a number of
/// readiness checks after each send
#[derive(Debug)]
pub struct LoopbackTx {
    log: TxLog,
    busy_checks: u32,
    countdown: u32,
}

impl LoopbackTx {
    /// Transmitter reporting busy for `busy_checks` readiness checks per send
    pub fn new(busy_checks: u32) -> Self {
        Self {
            log: TxLog::default(),
            busy_checks,
            countdown: 0,
        }
    }

    /// Transmitter that never completes a send
    pub fn stuck() -> Self {
        Self::new(u32::MAX)
    }

    pub fn log(&self) -> TxLog {
        self.log.clone()
    }
}

impl TxPort for LoopbackTx {
    fn is_ready(&mut self) -> bool {
        if self.countdown == 0 {
            return true;
        }
        if self.countdown != u32::MAX {
            self.countdown -= 1;
        }
        false
    }

    fn start_send(&mut self, data: &[u8]) -> Result<(), HalError> {
        lock(&self.log.sent).push(data.to_vec());
        self.countdown = self.busy_checks;
        Ok(())
    }
}
