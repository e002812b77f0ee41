//! Transmit path: wait for the previous send, stage, then fire

use crate::error::FramerError;
use crate::hal::{TickSource, TxPort};
use tracing::{debug, warn};

/// Staged fire-and-forget transmitter
pub struct Transmitter<P: TxPort, C: TickSource> {
    port: P,
    clock: C,
    /// Staging buffer; the peripheral reads from here while sending
    buffer: Box<[u8]>,
    /// Wait bound for the previous send in [`Transmitter::transmit`]
    ready_timeout_ms: u64,
}

impl<P: TxPort, C: TickSource> Transmitter<P, C> {
    pub fn new(port: P, clock: C, buffer_capacity: usize, ready_timeout_ms: u64) -> Self {
        Self {
            port,
            clock,
            buffer: vec![0u8; buffer_capacity].into_boxed_slice(),
            ready_timeout_ms,
        }
    }

    /// Busy-wait until the port is ready or `timeout_ms` elapses
    fn wait_ready(&mut self, timeout_ms: u64) -> Result<(), FramerError> {
        let started = self.clock.now_ms();
        while !self.port.is_ready() {
            if self.clock.now_ms().wrapping_sub(started) >= timeout_ms {
                return Err(FramerError::TransmitTimeout(timeout_ms));
            }
            std::hint::spin_loop();
        }
        Ok(())
    }

    /// Stage `data` once the previous send finished, then start sending it.
    ///
    /// Returns without waiting for this send to complete.
    pub fn transmit(&mut self, data: &[u8]) -> Result<(), FramerError> {
        self.stage_and_send(data, self.ready_timeout_ms)
    }

    /// Send `data` and block until it completes or `timeout_ms` elapses.
    ///
    /// The deadline covers both waiting for the previous send and this one.
    pub fn transmit_blocking(&mut self, data: &[u8], timeout_ms: u64) -> Result<(), FramerError> {
        let started = self.clock.now_ms();
        self.stage_and_send(data, timeout_ms)?;

        let spent = self.clock.now_ms().wrapping_sub(started);
        if self.wait_ready(timeout_ms.saturating_sub(spent)).is_err() {
            warn!(timeout_ms, "Transmit did not complete in time");
            return Err(FramerError::TransmitTimeout(timeout_ms));
        }
        Ok(())
    }

    fn stage_and_send(&mut self, data: &[u8], timeout_ms: u64) -> Result<(), FramerError> {
        if data.len() > self.buffer.len() {
            return Err(FramerError::PayloadTooLarge {
                len: data.len(),
                capacity: self.buffer.len(),
            });
        }

        if let Err(e) = self.wait_ready(timeout_ms) {
            warn!(timeout_ms, "Previous transmit still in flight");
            return Err(e);
        }

        self.buffer[..data.len()].copy_from_slice(data);
        self.port.start_send(&self.buffer[..data.len()])?;
        debug!(len = data.len(), "Transmit started");
        Ok(())
    }

    /// Whether a send is still in flight
    pub fn is_busy(&mut self) -> bool {
        !self.port.is_ready()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn port(&self) -> &P {
        &self.port
    }
}
