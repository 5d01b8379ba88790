//! Sample and channel-set value objects flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier for one signal channel.
///
/// Channel ids survive enable/disable cycles; buffers and filter state are
/// keyed by this id, never by positional index.
pub type ChannelId = u32;

/// One timestamped multichannel sample.
///
/// Immutable value object: produced by a [`SampleSource`](crate::source::SampleSource),
/// consumed exactly once by the filter/buffer stage, never retained beyond
/// buffering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Capture timestamp (UTC).
    pub timestamp: DateTime<Utc>,

    /// Raw per-channel values, one per active channel at capture time.
    pub values: Vec<f64>,

    /// Nominal sample rate of the producing source (Hz).
    pub sample_rate: f64,

    /// Monotonically increasing sequence number, used for loss accounting.
    pub sequence: u64,
}

impl Sample {
    pub fn new(values: Vec<f64>, sample_rate: f64, sequence: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            values,
            sample_rate,
            sequence,
        }
    }
}
