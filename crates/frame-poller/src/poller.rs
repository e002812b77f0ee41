//! Poll Loop Implementation

use serial_framing::{FrameEngine, FramerError, RawFrame, RxDma, TickSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between poll steps (default: 5ms)
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5),
        }
    }
}

/// Errors that end the poll loop
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Frame engine error: {0}")]
    Engine(#[from] FramerError),
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub polls: u64,
    /// Frames delivered to the channel
    pub forwarded: u64,
    /// Frames dropped because the channel was full
    pub dropped: u64,
}

/// Cloneable handle that stops a running [`PollLoop`]
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Ask the loop to exit after its current cycle
    pub fn stop(&self) {
        info!("Stopping poll loop");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Periodic poll driver for a [`FrameEngine`]
pub struct PollLoop<D: RxDma, C: TickSource> {
    engine: FrameEngine<D, C>,
    config: PollerConfig,
    running: Arc<AtomicBool>,
}

impl<D: RxDma, C: TickSource> PollLoop<D, C> {
    pub fn new(engine: FrameEngine<D, C>, config: PollerConfig) -> Self {
        Self {
            engine,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
        }
    }

    /// Poll every interval until stopped, the receiver is dropped, or the engine faults
    pub async fn run(&mut self, frame_tx: mpsc::Sender<RawFrame>) -> Result<PollSummary, PollerError> {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            mode = ?self.engine.mode(),
            "Starting poll loop"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = PollSummary::default();

        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;

            if let Err(e) = self.engine.poll() {
                error!("Poll step failed: {}", e);
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
            summary.polls += 1;

            while let Ok(frame) = self.engine.pull_frame() {
                match frame_tx.try_send(frame) {
                    Ok(()) => summary.forwarded += 1,
                    Err(TrySendError::Full(_)) => {
                        summary.dropped += 1;
                        warn!("Frame channel full, frame dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Receiver dropped, stopping poll loop");
                        self.running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        }

        info!(
            polls = summary.polls,
            forwarded = summary.forwarded,
            dropped = summary.dropped,
            "Poll loop stopped"
        );
        Ok(summary)
    }

    pub fn engine(&self) -> &FrameEngine<D, C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FrameEngine<D, C> {
        &mut self.engine
    }

    pub fn into_engine(self) -> FrameEngine<D, C> {
        self.engine
    }
}
