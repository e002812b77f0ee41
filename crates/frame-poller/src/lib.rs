//! Frame Poller
//!
//! Drives the frame engine's poll step from a tokio interval and forwards
//! completed frames to the application over a channel.

mod poller;

pub use poller::{PollLoop, PollSummary, PollerConfig, PollerError, StopHandle};
