//! Stream state machine and the shared pipeline aggregate.
//!
//! All mutable pipeline state — buffers, filter chains, metrics, counters —
//! lives in [`PipelineShared`], owned exclusively by the stream controller
//! behind an `Arc<RwLock<_>>`. The render scheduler and analyzers only ever
//! receive snapshots copied out under a read lock.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;
use std::time::Instant;

use crate::buffer::ChannelBank;
use crate::config::{defaults, StreamConfig};
use crate::error::ConfigError;
use crate::filters::FilterChain;
use crate::types::{BandPower, Channel, ChannelId, SessionStats, StreamMetrics};

// ============================================================================
// State machine
// ============================================================================

/// Stream lifecycle states.
///
/// ```text
/// Idle ──start()──▶ Connecting ──first sample──▶ Streaming ──stop()──▶ Stopped
///   ▲                   │                                                │
///   └── connect failure ┘                    start() ◀───────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Stopped,
}

impl StreamState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Shared aggregate
// ============================================================================

/// The controller-owned mutable core of the pipeline.
pub struct PipelineShared {
    pub state: StreamState,
    /// Reason for the last transition back to `Idle`, if it was a failure.
    pub last_error: Option<String>,

    /// Configured channels, keyed by stable id.
    pub channels: BTreeMap<ChannelId, Channel>,
    pub bank: ChannelBank,
    /// Per-channel filter chains, created lazily alongside buffers.
    pub filters: BTreeMap<ChannelId, FilterChain>,

    pub metrics: StreamMetrics,
    pub stats: SessionStats,

    /// Effective sample rate, taken from arriving samples; the configured
    /// nominal rate until the first sample lands.
    pub sample_rate: f64,
    /// Timestamp of the most recently ingested sample.
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_sequence: Option<u64>,
    pub last_arrival: Option<Instant>,
    /// Smoothed inter-arrival interval (seconds).
    pub mean_interarrival: Option<f64>,
    /// Sequence numbers skipped since session start.
    pub sequences_missed: u64,

    pub started_at: Option<Instant>,

    /// Recent band-power rows for trend display, newest last. Bounded by
    /// [`defaults::BAND_HISTORY_ROWS`].
    pub band_history: VecDeque<Vec<BandPower>>,
}

impl PipelineShared {
    pub fn new(config: &StreamConfig, channels: Vec<Channel>) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(config.buffer_capacity_samples)
            .ok_or(ConfigError::InvalidBufferCapacity(0))?;
        Ok(Self {
            state: StreamState::Idle,
            last_error: None,
            channels: channels.into_iter().map(|c| (c.id, c)).collect(),
            bank: ChannelBank::new(capacity),
            filters: BTreeMap::new(),
            metrics: StreamMetrics::default(),
            stats: SessionStats::default(),
            sample_rate: defaults::NOMINAL_SAMPLE_RATE_HZ,
            last_timestamp: None,
            last_sequence: None,
            last_arrival: None,
            mean_interarrival: None,
            sequences_missed: 0,
            started_at: None,
            band_history: VecDeque::with_capacity(defaults::BAND_HISTORY_ROWS),
        })
    }

    /// Active channel ids in stable (ascending id) order.
    ///
    /// Sample value vectors are positional against this ordering at capture
    /// time.
    pub fn active_channel_ids(&self) -> Vec<ChannelId> {
        self.channels
            .values()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect()
    }

    /// Channel ids the renderer should draw, honoring the configured order.
    ///
    /// An empty `visible_channel_ids` means "all active channels".
    pub fn visible_channel_ids(&self, config: &StreamConfig) -> Vec<ChannelId> {
        if config.visible_channel_ids.is_empty() {
            self.active_channel_ids()
        } else {
            config
                .visible_channel_ids
                .iter()
                .copied()
                .filter(|id| self.channels.contains_key(id))
                .collect()
        }
    }

    /// Discard all buffered history and recursive filter state.
    ///
    /// Valid in any lifecycle state.
    pub fn clear(&mut self) {
        self.bank.clear_all();
        for chain in self.filters.values_mut() {
            chain.reset();
        }
        self.band_history.clear();
        self.metrics.buffer_fill_ratio = 0.0;
    }

    /// Record one band-power row, evicting the oldest beyond the cap.
    pub fn record_band_powers(&mut self, row: Vec<BandPower>) {
        if self.band_history.len() == defaults::BAND_HISTORY_ROWS {
            self.band_history.pop_front();
        }
        self.band_history.push_back(row);
    }

    /// Rebuild filter chains after a cutoff/notch change.
    ///
    /// Old recursive state is invalid under new coefficients, so chains are
    /// reconstructed outright rather than patched.
    pub fn rebuild_filters(&mut self, config: &StreamConfig) {
        let rate = self.sample_rate;
        for chain in self.filters.values_mut() {
            *chain = FilterChain::from_config(config, rate);
        }
    }

    /// Reconstruct buffers for a new capacity. History is discarded —
    /// resizing in place would leave a partially coherent window.
    pub fn rebuild_buffers(&mut self, config: &StreamConfig) -> Result<(), ConfigError> {
        let capacity = NonZeroUsize::new(config.buffer_capacity_samples)
            .ok_or(ConfigError::InvalidBufferCapacity(0))?;
        self.bank = ChannelBank::new(capacity);
        self.metrics.buffer_fill_ratio = 0.0;
        Ok(())
    }

    /// Number of samples one render window spans at the effective rate.
    pub fn window_samples(&self, config: &StreamConfig) -> usize {
        ((config.time_window_secs * self.sample_rate).round() as usize).max(1)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.map_or(0, |t| t.elapsed().as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> PipelineShared {
        let channels = (0..4).map(|i| Channel::new(i, format!("ch{i}"))).collect();
        PipelineShared::new(&StreamConfig::default(), channels).expect("valid defaults")
    }

    #[test]
    fn test_initial_state_is_idle() {
        let s = shared();
        assert_eq!(s.state, StreamState::Idle);
        assert!(s.last_error.is_none());
    }

    #[test]
    fn test_active_ids_skip_disabled() {
        let mut s = shared();
        s.channels.get_mut(&2).expect("ch2").active = false;
        assert_eq!(s.active_channel_ids(), vec![0, 1, 3]);
    }

    #[test]
    fn test_visible_ids_default_to_active() {
        let s = shared();
        let cfg = StreamConfig::default();
        assert_eq!(s.visible_channel_ids(&cfg), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_visible_ids_honor_configured_order() {
        let s = shared();
        let cfg = StreamConfig {
            visible_channel_ids: vec![3, 0, 99],
            ..Default::default()
        };
        // Unknown ids are skipped, order preserved.
        assert_eq!(s.visible_channel_ids(&cfg), vec![3, 0]);
    }

    #[test]
    fn test_window_samples_from_rate_and_window() {
        let mut s = shared();
        s.sample_rate = 500.0;
        let cfg = StreamConfig {
            time_window_secs: 2.0,
            ..Default::default()
        };
        assert_eq!(s.window_samples(&cfg), 1000);
    }

    #[test]
    fn test_state_display_names() {
        assert_eq!(StreamState::Idle.to_string(), "idle");
        assert_eq!(StreamState::Streaming.to_string(), "streaming");
    }
}
