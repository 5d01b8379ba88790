//! Wavescope demo binary.
//!
//! Streams synthetic multichannel data through the full pipeline and logs
//! periodic status lines (metrics, quality, dominant frequency). Useful for
//! eyeballing the pipeline without a display frontend.
//!
//! # Usage
//!
//! ```bash
//! # 4 channels at 256 Hz for 10 seconds
//! cargo run --release -- --channels 4 --rate 256 --duration 10
//!
//! # Inject artifacts and export the final window as CSV
//! cargo run --release -- --artifacts 0.002 --export out.csv
//! ```
//!
//! # Environment Variables
//!
//! - `WAVESCOPE_CONFIG`: path to a TOML config file
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;

use wavescope::{
    Channel, ExportFormat, ExportSelection, StreamConfig, StreamController, SyntheticConfig,
    SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(name = "wavescope")]
#[command(about = "Real-time multichannel signal pipeline demo")]
#[command(version)]
struct CliArgs {
    /// Number of synthetic channels
    #[arg(long, default_value = "4")]
    channels: usize,

    /// Synthetic sample rate in Hz
    #[arg(long, default_value = "256.0")]
    rate: f64,

    /// How long to stream, in seconds
    #[arg(long, default_value = "10")]
    duration: u64,

    /// Per-sample artifact injection probability (0 disables)
    #[arg(long, default_value = "0.0")]
    artifacts: f64,

    /// Export the final buffered window to this path (.csv or .json)
    #[arg(long)]
    export: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config = StreamConfig::load().context("Failed to load configuration")?;
    let channels: Vec<Channel> = (0..args.channels as u32)
        .map(|i| Channel::new(i, format!("ch{i}")))
        .collect();

    let controller =
        StreamController::new(config, channels).context("Failed to build pipeline")?;

    let source = SyntheticSource::new(SyntheticConfig {
        channels: args.channels,
        sample_rate: args.rate,
        artifact_probability: args.artifacts,
        ..Default::default()
    });

    controller.start(source).await.context("Failed to start stream")?;
    info!(
        channels = args.channels,
        rate = args.rate,
        duration = args.duration,
        "Streaming synthetic data"
    );

    let mut frames = controller.frames();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.duration);
    let mut status_tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = status_tick.tick() => {
                let metrics = controller.status().await;
                let frame = frames.borrow().clone();
                match frame {
                    Some(f) => info!(
                        rate_hz = format!("{:.1}", metrics.data_rate_hz),
                        fill = format!("{:.2}", metrics.buffer_fill_ratio),
                        quality = format!("{:.0}", f.quality.overall_score),
                        dominant_hz = format!("{:.1}", f.spectrum.dominant_frequency),
                        "status"
                    ),
                    None => info!("status: no frame yet"),
                }
            }
        }
    }

    controller.stop().await;
    let stats = controller.stats().await;
    info!(
        samples = stats.samples_processed,
        frames = stats.frames_rendered,
        dropped = stats.samples_dropped,
        "Stream finished"
    );

    if let Some(path) = args.export {
        let format = if path.ends_with(".json") {
            ExportFormat::Json
        } else {
            ExportFormat::Csv
        };
        let bytes = controller
            .export_window(format, ExportSelection::default())
            .await
            .context("Export failed")?;
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write {path}"))?;
        info!(path = %path, "Window exported");
    }

    Ok(())
}
