//! Framing Error Types

use ring_buffer::RingError;
use thiserror::Error;

/// Errors reported by the hardware seam
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    /// Receive transfer could not be started
    #[error("Transfer start failed: {0}")]
    Start(String),

    /// Transmit could not be issued
    #[error("Send failed: {0}")]
    Send(String),
}

/// Errors that can occur on the serial framing paths
#[derive(Debug, Error)]
pub enum FramerError {
    /// Frame queue is empty
    #[error("No frame available")]
    NoFrameAvailable,

    /// Receive transfer did not restart after a ring resize
    #[error("Reconfiguration failed, receive transfer not restarted: {0}")]
    Reconfigure(HalError),

    /// Receiver is stopped after a failed restart
    #[error("Receiver faulted after a failed transfer restart")]
    Faulted,

    /// Transmitter stayed busy past the deadline
    #[error("Transmitter not ready after {0}ms")]
    TransmitTimeout(u64),

    /// Payload does not fit the send buffer
    #[error("Payload of {len} bytes exceeds send buffer of {capacity} bytes")]
    PayloadTooLarge { len: usize, capacity: usize },

    /// Hardware error
    #[error("Hardware error: {0}")]
    Hal(#[from] HalError),

    /// Ring store error
    #[error("Ring error: {0}")]
    Ring(#[from] RingError),
}
