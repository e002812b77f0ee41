//! Serial Frame Monitor
//!
//! Host-side harness around the frame engine: settings loading, logging
//! setup, and the pump that moves bytes from a serial port into the
//! software transfer engine.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serial_framing::{DmaFeed, FramingConfig, RawFrame};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

/// Read chunk size for the serial pump
const READ_CHUNK: usize = 256;

/// Errors while loading monitor settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Serial device path (e.g., "/dev/ttyUSB0" or "COM3")
    pub device: String,
    pub baud_rate: u32,
    /// Poll step period in milliseconds
    pub poll_interval_ms: u64,
    /// Frames buffered between the poll loop and the printer
    pub channel_capacity: usize,
    /// tracing level name
    pub log_level: String,
    pub framing: FramingConfig,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            poll_interval_ms: 5,
            channel_capacity: 64,
            log_level: "info".to_string(),
            framing: FramingConfig::end_marker(b"\n"),
        }
    }
}

impl MonitorSettings {
    /// Layer defaults, an optional settings file and `SERIAL_MONITOR__*` environment overrides
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings: Self = builder
            .add_source(Environment::with_prefix("SERIAL_MONITOR").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.device.is_empty() {
            return Err(SettingsError::Invalid {
                field: "device",
                reason: "must not be empty",
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "poll_interval_ms",
                reason: "must be at least 1",
            });
        }
        if self.channel_capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "channel_capacity",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Initialize logging to stderr, keeping stdout for frame output
pub fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Copy bytes from `reader` into the transfer engine feed until end of stream
pub async fn pump_serial<R>(mut reader: R, feed: DmaFeed) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(total);
        }
        feed.push(&chunk[..n]);
        total += n as u64;
        debug!(n, total, "Serial bytes received");
    }
}

/// One output line per frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRecord {
    pub timestamp_ms: u64,
    pub len: usize,
    /// Payload as lowercase hex
    pub hex: String,
    /// Payload as text when it is valid UTF-8
    pub text: Option<String>,
}

impl From<&RawFrame> for FrameRecord {
    fn from(frame: &RawFrame) -> Self {
        let payload = frame.payload();
        Self {
            timestamp_ms: frame.timestamp_ms(),
            len: payload.len(),
            hex: payload.iter().map(|b| format!("{:02x}", b)).collect(),
            text: std::str::from_utf8(payload).ok().map(str::to_string),
        }
    }
}
