//! Coordinate-mapped render frame emitted by the render scheduler.
//!
//! A frame is the boundary object handed to display collaborators: all
//! time/amplitude mapping has already happened, so consumers draw polylines
//! in a normalized [0,1]×[0,1] space without knowing sample rates or gains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quality::QualitySnapshot;
use super::sample::ChannelId;
use super::spectrum::SpectrumSummary;

/// One channel's trace, mapped into normalized coordinates.
///
/// `points` are (x, y) with x in [0,1] left-to-right over the time window and
/// y in [0,1] bottom-to-top within the channel's lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub channel_id: ChannelId,
    pub color: String,
    pub points: Vec<(f64, f64)>,
}

/// One horizontal band-power bar, normalized share in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandBar {
    pub name: String,
    pub relative_power: f64,
}

/// A complete coordinate-mapped frame.
///
/// All channels within one frame are drawn against the same time window and
/// the same quality snapshot; the scheduler never emits a partially built
/// frame. Two frames built from identical buffer snapshots compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Timestamp of the oldest sample in the window (None when empty).
    pub window_start: Option<DateTime<Utc>>,
    /// Timestamp of the newest sample in the window.
    pub window_end: Option<DateTime<Utc>>,
    /// Length of the mapped window in seconds (from configuration).
    pub time_window_secs: f64,
    pub polylines: Vec<Polyline>,
    pub quality: QualitySnapshot,
    pub spectrum: SpectrumSummary,
    pub band_bars: Vec<BandBar>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::spectrum::default_bands;

    #[test]
    fn test_frames_from_same_inputs_compare_equal() {
        let make = || RenderFrame {
            window_start: None,
            window_end: None,
            time_window_secs: 4.0,
            polylines: vec![],
            quality: QualitySnapshot::empty(),
            spectrum: SpectrumSummary::silent(250.0, &default_bands()),
            band_bars: vec![],
        };
        assert_eq!(make(), make());
    }
}
