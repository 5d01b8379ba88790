//! Heuristic signal-quality assessment.
//!
//! Deterministic, rule-based scoring over a sliding window: per-channel RMS
//! and peak amplitude are compared against configurable thresholds, each
//! violation converts into a penalty subtracted from a 100-point baseline,
//! and per-channel scores aggregate (mean) into the overall score.
//!
//! Advisory, not diagnostic: the thresholds are tuning knobs with no stated
//! clinical derivation, and scores only summarize how clean the recent
//! window looks.

use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use crate::config::QualityThresholds;
use crate::types::{ArtifactFlags, ChannelId, ChannelQuality, QualitySnapshot};

// Score penalties per violated threshold. Saturation dominates because it
// means the window is amplifier overload, not signal.
const PENALTY_BLINK: f64 = 15.0;
const PENALTY_MUSCLE: f64 = 20.0;
const PENALTY_ELECTRODE_POP: f64 = 25.0;
const PENALTY_ENVIRONMENTAL: f64 = 15.0;
const PENALTY_SATURATION: f64 = 60.0;

/// Assess one window of per-channel data.
///
/// A channel with an empty window scores 0 and contributes no artifact
/// flags; it still appears in the snapshot so renderers can grey it out.
/// An empty channel map yields [`QualitySnapshot::empty`].
pub fn assess(
    windows: &BTreeMap<ChannelId, Vec<f64>>,
    thresholds: &QualityThresholds,
) -> QualitySnapshot {
    if windows.is_empty() {
        return QualitySnapshot::empty();
    }

    let mut channels = BTreeMap::new();
    let mut aggregate_flags = ArtifactFlags::default();
    let mut score_sum = 0.0;

    for (&id, window) in windows {
        let cq = assess_channel(window, thresholds);
        aggregate_flags.merge(&cq.artifacts);
        score_sum += cq.score;
        channels.insert(id, cq);
    }

    QualitySnapshot {
        overall_score: score_sum / channels.len() as f64,
        channels,
        artifacts: aggregate_flags,
    }
}

fn assess_channel(window: &[f64], thresholds: &QualityThresholds) -> ChannelQuality {
    if window.is_empty() {
        return ChannelQuality {
            score: 0.0,
            rms: 0.0,
            peak: 0.0,
            impedance_kohm: 0.0,
            artifacts: ArtifactFlags::default(),
        };
    }

    // Non-finite values were neutralized by the filter chain before storage,
    // but recompute defensively over finite values only.
    let finite: Vec<f64> = window.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return ChannelQuality {
            score: 0.0,
            rms: 0.0,
            peak: 0.0,
            impedance_kohm: 0.0,
            artifacts: ArtifactFlags::default(),
        };
    }

    let rms = rms_of(&finite);
    let peak = finite.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

    let artifacts = ArtifactFlags {
        blink: peak > thresholds.blink_peak,
        muscle: rms > thresholds.muscle_rms,
        electrode_pop: peak > thresholds.electrode_pop_peak,
        environmental_noise: rms > thresholds.environmental_rms,
        saturation: peak >= thresholds.saturation_peak,
    };

    let mut score = 100.0;
    if artifacts.blink {
        score -= PENALTY_BLINK;
    }
    if artifacts.muscle {
        score -= PENALTY_MUSCLE;
    }
    if artifacts.electrode_pop {
        score -= PENALTY_ELECTRODE_POP;
    }
    if artifacts.environmental_noise {
        score -= PENALTY_ENVIRONMENTAL;
    }
    if artifacts.saturation {
        score -= PENALTY_SATURATION;
    }
    let score = score.max(0.0);

    ChannelQuality {
        score,
        rms,
        peak,
        impedance_kohm: estimate_impedance(&finite, rms),
        artifacts,
    }
}

fn rms_of(values: &[f64]) -> f64 {
    let sum_squares: f64 = values.iter().map(|v| v * v).sum();
    (sum_squares / values.len() as f64).sqrt()
}

/// Impedance-like contact health estimate (kΩ-equivalents).
///
/// Heuristic: a near-flat window (standard deviation collapsing toward zero)
/// reads as a poor contact, a noisy window reads as a loose one. This is a
/// relative health indicator, not an electrical measurement.
fn estimate_impedance(values: &[f64], rms: f64) -> f64 {
    let std_dev = if values.len() > 1 {
        values.iter().copied().std_dev()
    } else {
        0.0
    };
    if std_dev < 1e-9 {
        // Flat line: likely disconnected or railed.
        return 500.0;
    }
    // Map amplitude into a 5–100 kΩ-ish range.
    (5.0 + rms * 0.5).min(100.0)
}
