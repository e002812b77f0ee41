//! Serial driver instance: receive engine and transmitter together

use crate::config::FramingConfig;
use crate::engine::FrameEngine;
use crate::error::FramerError;
use crate::frame::RawFrame;
use crate::hal::{RxDma, TickSource, TxPort};
use crate::transmit::Transmitter;

/// One serial peripheral with framed receive and staged transmit
pub struct SerialDriver<D: RxDma, P: TxPort, C: TickSource + Clone> {
    rx: FrameEngine<D, C>,
    tx: Transmitter<P, C>,
}

impl<D: RxDma, P: TxPort, C: TickSource + Clone> SerialDriver<D, P, C> {
    pub fn new(config: FramingConfig, dma: D, port: P, clock: C) -> Result<Self, FramerError> {
        let tx = Transmitter::new(
            port,
            clock.clone(),
            config.tx_buffer_capacity,
            config.tx_ready_timeout_ms,
        );
        let rx = FrameEngine::new(config, dma, clock)?;
        Ok(Self { rx, tx })
    }

    pub fn poll(&mut self) -> Result<usize, FramerError> {
        self.rx.poll()
    }

    pub fn pull_frame(&mut self) -> Result<RawFrame, FramerError> {
        self.rx.pull_frame()
    }

    pub fn pending_frame_count(&self) -> usize {
        self.rx.pending_frame_count()
    }

    pub fn transmit(&mut self, data: &[u8]) -> Result<(), FramerError> {
        self.tx.transmit(data)
    }

    pub fn transmit_blocking(&mut self, data: &[u8], timeout_ms: u64) -> Result<(), FramerError> {
        self.tx.transmit_blocking(data, timeout_ms)
    }

    pub fn set_completion_callback<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.rx.set_completion_callback(callback);
    }

    pub fn clear_completion_callback(&mut self) {
        self.rx.clear_completion_callback();
    }

    pub fn rx(&self) -> &FrameEngine<D, C> {
        &self.rx
    }

    pub fn rx_mut(&mut self) -> &mut FrameEngine<D, C> {
        &mut self.rx
    }

    pub fn tx_mut(&mut self) -> &mut Transmitter<P, C> {
        &mut self.tx
    }
}
