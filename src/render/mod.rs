//! Frame-paced render scheduler and coordinate mapping.
//!
//! Runs on a fixed cadence independent of sample arrival. Each cycle copies
//! one consistent window snapshot out of the shared state under a single
//! read lock, then does all quality/spectral/mapping work on the copy — the
//! cycle never blocks the sample loop and never observes a half-written
//! buffer. With no new samples the same window is redrawn, producing an
//! identical frame.

use arc_swap::ArcSwap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::pipeline::{PipelineShared, StreamState};
use crate::quality;
use crate::spectral::SpectralAnalyzer;
use crate::types::{BandBar, ChannelId, Polyline, RenderFrame};

// ============================================================================
// Window snapshot
// ============================================================================

/// One consistent read of everything a frame needs.
///
/// Copied out under a single read lock so every channel in the frame is
/// drawn against the same time window.
pub struct WindowSnapshot {
    /// Visible channels in draw order with their window values (oldest
    /// first) and display color.
    pub channels: Vec<(ChannelId, String, Vec<f64>)>,
    pub sample_rate: f64,
    /// Samples one full window spans at the effective rate.
    pub window_samples: usize,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl WindowSnapshot {
    /// Capture a snapshot from the shared state.
    pub fn capture(shared: &PipelineShared, config: &StreamConfig) -> Self {
        let window_samples = shared.window_samples(config);
        let channels = shared
            .visible_channel_ids(config)
            .into_iter()
            .map(|id| {
                let color = shared
                    .channels
                    .get(&id)
                    .map_or_else(|| "#ffffff".to_string(), |c| c.color.clone());
                (id, color, shared.bank.latest(id, window_samples))
            })
            .collect();
        Self {
            channels,
            sample_rate: shared.sample_rate,
            window_samples,
            last_timestamp: shared.last_timestamp,
        }
    }
}

// ============================================================================
// Frame building
// ============================================================================

/// Build one coordinate-mapped frame from a snapshot.
///
/// Pure with respect to the snapshot and configuration: identical inputs
/// produce identical frames.
pub fn build_frame(
    snapshot: &WindowSnapshot,
    config: &StreamConfig,
    analyzer: &mut SpectralAnalyzer,
) -> RenderFrame {
    let windows: BTreeMap<ChannelId, Vec<f64>> = snapshot
        .channels
        .iter()
        .map(|(id, _, values)| (*id, values.clone()))
        .collect();
    let quality = quality::assess(&windows, &config.quality);

    // Spectrum is computed over the focus channel: the first visible channel
    // that has data this window.
    let focus: &[f64] = snapshot
        .channels
        .iter()
        .map(|(_, _, values)| values.as_slice())
        .find(|values| !values.is_empty())
        .unwrap_or(&[]);
    let spectrum = analyzer.analyze(focus, snapshot.sample_rate, &config.bands);

    let band_bars = spectrum
        .bands
        .iter()
        .map(|bp| BandBar {
            name: bp.band.name.clone(),
            relative_power: bp.relative,
        })
        .collect();

    let polylines = snapshot
        .channels
        .iter()
        .map(|(id, color, values)| Polyline {
            channel_id: *id,
            color: color.clone(),
            points: map_points(values, snapshot.window_samples, config),
        })
        .collect();

    let longest = snapshot
        .channels
        .iter()
        .map(|(_, _, values)| values.len())
        .max()
        .unwrap_or(0);
    let window_start = match (snapshot.last_timestamp, longest) {
        (Some(end), n) if n > 1 && snapshot.sample_rate > 0.0 => {
            let span_us = ((n - 1) as f64 / snapshot.sample_rate * 1e6).round() as i64;
            Some(end - ChronoDuration::microseconds(span_us))
        }
        (Some(end), 1) => Some(end),
        _ => None,
    };

    RenderFrame {
        window_start,
        window_end: snapshot.last_timestamp,
        time_window_secs: config.time_window_secs,
        polylines,
        quality,
        spectrum,
        band_bars,
    }
}

/// Map one channel window into normalized [0,1]×[0,1] coordinates.
///
/// Time runs left to right; a partially filled window right-aligns so the
/// newest sample always sits at x = 1. Amplitude maps into the channel lane
/// around the 0.5 midline, either against the window's own peak (auto-gain)
/// or against the saturation ceiling scaled by the configured gain.
fn map_points(values: &[f64], window_samples: usize, config: &StreamConfig) -> Vec<(f64, f64)> {
    if values.is_empty() {
        return Vec::new();
    }

    let baseline = if config.baseline_correction {
        values.iter().sum::<f64>() / values.len() as f64
    } else {
        0.0
    };

    let scale = if config.auto_gain {
        values
            .iter()
            .map(|v| (v - baseline).abs())
            .fold(0.0_f64, f64::max)
            .max(1e-9)
    } else {
        config.quality.saturation_peak / config.gain_multiplier
    };

    let slots = window_samples.max(values.len());
    let denom = (slots - 1).max(1) as f64;
    let offset = slots - values.len();
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let x = (offset + i) as f64 / denom;
            let y = 0.5 + 0.5 * ((v - baseline) / scale).clamp(-1.0, 1.0);
            (x, y)
        })
        .collect()
}

// ============================================================================
// Render loop
// ============================================================================

/// The frame-paced loop task.
///
/// Publishes frames through a `watch` channel; consumers always see the
/// latest complete frame and never a partial one. Stopping the stream
/// cancels future cycles after the in-flight one completes.
pub struct RenderLoop {
    shared: Arc<RwLock<PipelineShared>>,
    config: Arc<ArcSwap<StreamConfig>>,
    frame_tx: watch::Sender<Option<RenderFrame>>,
    cancel: CancellationToken,
    analyzer: SpectralAnalyzer,
}

impl RenderLoop {
    pub fn new(
        shared: Arc<RwLock<PipelineShared>>,
        config: Arc<ArcSwap<StreamConfig>>,
        frame_tx: watch::Sender<Option<RenderFrame>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            config,
            frame_tx,
            cancel,
            analyzer: SpectralAnalyzer::new(),
        }
    }

    pub async fn run(mut self) {
        // Config (and thus cadence) is re-read every cycle so frame-rate
        // changes apply on the next cycle.
        info!("Render loop started");
        loop {
            let config = self.config.load_full();
            let period = Duration::from_secs_f64(1.0 / config.target_frame_rate);

            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("Render loop cancelled");
                    break;
                }
                () = tokio::time::sleep(period) => {}
            }

            let snapshot = {
                let shared = self.shared.read().await;
                // The in-flight cycle completes, but once stopped no further
                // frames are scheduled.
                if shared.state != StreamState::Streaming
                    && shared.state != StreamState::Connecting
                {
                    break;
                }
                WindowSnapshot::capture(&shared, &config)
            };

            let frame = build_frame(&snapshot, &config, &mut self.analyzer);

            {
                let mut shared = self.shared.write().await;
                shared.stats.frames_rendered += 1;
                shared.record_band_powers(frame.spectrum.bands.clone());
            }

            // send_replace stores the frame even while nobody is watching,
            // so a late subscriber immediately sees the latest one.
            self.frame_tx.send_replace(Some(frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;

    fn snapshot(values: Vec<f64>, window_samples: usize) -> WindowSnapshot {
        WindowSnapshot {
            channels: vec![(0, "#4fc3f7".to_string(), values)],
            sample_rate: 256.0,
            window_samples,
            last_timestamp: None,
        }
    }

    #[test]
    fn test_full_window_spans_zero_to_one() {
        let mut analyzer = SpectralAnalyzer::new();
        let config = StreamConfig::default();
        let frame = build_frame(&snapshot(vec![0.0; 100], 100), &config, &mut analyzer);
        let points = &frame.polylines[0].points;
        assert_eq!(points.len(), 100);
        assert_eq!(points[0].0, 0.0);
        assert_eq!(points[99].0, 1.0);
    }

    #[test]
    fn test_partial_window_right_aligns() {
        let mut analyzer = SpectralAnalyzer::new();
        let config = StreamConfig::default();
        let frame = build_frame(&snapshot(vec![1.0, 2.0], 100), &config, &mut analyzer);
        let points = &frame.polylines[0].points;
        assert_eq!(points.len(), 2);
        // Newest sample pinned to the right edge.
        assert_eq!(points[1].0, 1.0);
        assert!(points[0].0 > 0.9);
    }

    #[test]
    fn test_amplitude_maps_into_unit_lane() {
        let mut analyzer = SpectralAnalyzer::new();
        let config = StreamConfig {
            auto_gain: true,
            baseline_correction: false,
            ..Default::default()
        };
        let values: Vec<f64> = (0..64)
            .map(|i| 30.0 * (f64::from(i) * 0.3).sin())
            .collect();
        let frame = build_frame(&snapshot(values, 64), &config, &mut analyzer);
        for &(x, y) in &frame.polylines[0].points {
            assert!((0.0..=1.0).contains(&x));
            assert!((0.0..=1.0).contains(&y));
        }
    }

    #[test]
    fn test_baseline_correction_centers_offset_signal() {
        let mut analyzer = SpectralAnalyzer::new();
        let config = StreamConfig {
            baseline_correction: true,
            ..Default::default()
        };
        // Constant offset with no oscillation: corrected to the midline.
        let frame = build_frame(&snapshot(vec![42.0; 32], 32), &config, &mut analyzer);
        for &(_, y) in &frame.polylines[0].points {
            assert!((y - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_identical_snapshots_build_identical_frames() {
        let mut analyzer = SpectralAnalyzer::new();
        let config = StreamConfig::default();
        let values: Vec<f64> = (0..256)
            .map(|i| (f64::from(i) * 0.25).sin() * 10.0)
            .collect();
        let a = build_frame(&snapshot(values.clone(), 256), &config, &mut analyzer);
        let b = build_frame(&snapshot(values, 256), &config, &mut analyzer);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_snapshot_builds_empty_frame() {
        let mut analyzer = SpectralAnalyzer::new();
        let config = StreamConfig::default();
        let snap = WindowSnapshot {
            channels: vec![],
            sample_rate: 256.0,
            window_samples: 1024,
            last_timestamp: None,
        };
        let frame = build_frame(&snap, &config, &mut analyzer);
        assert!(frame.polylines.is_empty());
        assert_eq!(frame.quality.overall_score, 0.0);
        assert_eq!(frame.spectrum.dominant_frequency, 0.0);
    }
}
