//! Quality snapshot types produced by the quality assessor.
//!
//! Scores are heuristic and advisory, not diagnostic: they summarize how
//! plausible the recent window looks, they do not certify signal integrity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::sample::ChannelId;

/// Discrete artifact classifications derived from amplitude thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFlags {
    /// Transient peak consistent with an eye-blink-like event.
    pub blink: bool,
    /// Sustained elevated RMS consistent with muscle/movement activity.
    pub muscle: bool,
    /// Isolated extreme peak consistent with an electrode pop.
    pub electrode_pop: bool,
    /// Broadband elevated noise floor (mains/environmental).
    pub environmental_noise: bool,
    /// Amplitude at or beyond the amplifier saturation ceiling.
    pub saturation: bool,
}

impl ArtifactFlags {
    pub fn any(&self) -> bool {
        self.blink || self.muscle || self.electrode_pop || self.environmental_noise || self.saturation
    }

    /// Union of two flag sets.
    pub fn merge(&mut self, other: &ArtifactFlags) {
        self.blink |= other.blink;
        self.muscle |= other.muscle;
        self.electrode_pop |= other.electrode_pop;
        self.environmental_noise |= other.environmental_noise;
        self.saturation |= other.saturation;
    }
}

/// Per-channel quality breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelQuality {
    /// 0–100 score for this channel over the assessed window.
    pub score: f64,
    /// RMS amplitude over the window.
    pub rms: f64,
    /// Peak absolute amplitude over the window.
    pub peak: f64,
    /// Impedance-like health value in kΩ-equivalents (heuristic).
    pub impedance_kohm: f64,
    pub artifacts: ArtifactFlags,
}

/// Signal quality over one assessment window.
///
/// Recomputed from the current buffer window each time a render frame is
/// requested; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    /// Mean of per-channel scores, 0–100.
    pub overall_score: f64,
    /// Keyed by channel id; deterministic iteration order for rendering.
    pub channels: BTreeMap<ChannelId, ChannelQuality>,
    /// Union of all per-channel artifact flags.
    pub artifacts: ArtifactFlags,
}

impl QualitySnapshot {
    /// Snapshot representing "no data assessed".
    pub fn empty() -> Self {
        Self {
            overall_score: 0.0,
            channels: BTreeMap::new(),
            artifacts: ArtifactFlags::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_merge_is_union() {
        let mut a = ArtifactFlags {
            blink: true,
            ..Default::default()
        };
        let b = ArtifactFlags {
            saturation: true,
            ..Default::default()
        };
        a.merge(&b);
        assert!(a.blink && a.saturation);
        assert!(a.any());
    }

    #[test]
    fn test_empty_snapshot_scores_zero() {
        let snap = QualitySnapshot::empty();
        assert_eq!(snap.overall_score, 0.0);
        assert!(!snap.artifacts.any());
    }
}
