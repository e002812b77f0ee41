//! Serial Frame Monitor - Main Entry Point

use frame_poller::{PollLoop, PollerConfig};
use serial_framing::{FrameEngine, SoftDma, StdClock};
use serial_monitor::{init_logging, pump_serial, FrameRecord, MonitorSettings};
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args().nth(1);
    let settings = MonitorSettings::load(settings_path.as_deref())?;
    init_logging(&settings.log_level);

    info!("=== Serial Frame Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        device = %settings.device,
        baud_rate = settings.baud_rate,
        mode = ?settings.framing.mode(),
        "Opening serial port"
    );

    let port = tokio_serial::new(&settings.device, settings.baud_rate).open_native_async()?;

    let dma = SoftDma::new();
    let feed = dma.feed();
    let engine = FrameEngine::new(settings.framing.clone(), dma, StdClock::new())?;
    let mut poller = PollLoop::new(
        engine,
        PollerConfig {
            interval: settings.poll_interval(),
        },
    );
    let stop = poller.stop_handle();

    let pump_stop = stop.clone();
    tokio::spawn(async move {
        match pump_serial(port, feed).await {
            Ok(total) => info!(total, "Serial port closed"),
            Err(e) => warn!("Serial read failed: {}", e),
        }
        pump_stop.stop();
    });

    let (frame_tx, mut frame_rx) = mpsc::channel(settings.channel_capacity);
    let poll_task = tokio::spawn(async move { poller.run(frame_tx).await });

    loop {
        tokio::select! {
            frame = frame_rx.recv() => match frame {
                Some(frame) => println!("{}", serde_json::to_string(&FrameRecord::from(&frame))?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                stop.stop();
                break;
            }
        }
    }

    let summary = poll_task.await??;
    info!(
        polls = summary.polls,
        forwarded = summary.forwarded,
        dropped = summary.dropped,
        "Monitor finished"
    );
    Ok(())
}
