//! Serial Frame Extraction
//!
//! Turns the byte stream landing in a DMA receive ring into discrete,
//! timestamped frames. One of four framing disciplines is active at a time
//! (fixed length, start marker, end marker, start and end marker), chosen
//! from the [`FramingConfig`]. The application drives [`FrameEngine::poll`]
//! from its control loop and pulls frames at its own pace.

mod config;
mod driver;
mod engine;
mod error;
mod frame;
mod hal;
mod notifier;
mod queue;
mod search;
mod strategy;
mod transmit;

pub use config::{FramingConfig, OverflowPolicy};
pub use driver::SerialDriver;
pub use engine::{FrameEngine, RxStats};
pub use error::{FramerError, HalError};
pub use frame::RawFrame;
pub use hal::{
    DmaFeed, DmaSnapshot, LoopbackTx, ManualClock, RxDma, SoftDma, StdClock, TickSource, TxLog,
    TxPort,
};
pub use notifier::CompletionNotifier;
pub use queue::FrameQueue;
pub use search::{find, search_frame};
pub use strategy::{build_strategy, FramingMode, FramingStrategy};
pub use transmit::Transmitter;

pub use ring_buffer::{RingStats, RingStore};
