//! Stream configuration: recognized options, defaults, file loading, and
//! validation.
//!
//! ## Loading Order
//!
//! 1. `WAVESCOPE_CONFIG` environment variable (path to TOML file)
//! 2. `wavescope.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Configuration is validated as a whole before it is accepted; a rejected
//! update leaves the running pipeline untouched. Accepted updates take
//! effect at the start of the next sample/render cycle, never mid-cycle.

pub mod defaults;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::types::{default_bands, ChannelId, FrequencyBand};

// ============================================================================
// Quality thresholds
// ============================================================================

/// Amplitude thresholds driving artifact flags and score penalties.
///
/// These are heuristic tuning knobs with no clinical derivation; treat them
/// as configuration, not physics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub blink_peak: f64,
    pub muscle_rms: f64,
    pub electrode_pop_peak: f64,
    pub environmental_rms: f64,
    pub saturation_peak: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            blink_peak: defaults::BLINK_PEAK_THRESHOLD,
            muscle_rms: defaults::MUSCLE_RMS_THRESHOLD,
            electrode_pop_peak: defaults::ELECTRODE_POP_THRESHOLD,
            environmental_rms: defaults::ENVIRONMENTAL_RMS_THRESHOLD,
            saturation_peak: defaults::SATURATION_THRESHOLD,
        }
    }
}

// ============================================================================
// Visual theme
// ============================================================================

/// Visual theme hint passed through to display collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    HighContrast,
}

// ============================================================================
// Stream configuration
// ============================================================================

/// Full render/pipeline configuration.
///
/// All options are recognized by external collaborators through
/// [`ConfigPatch`]; the effects of each are documented where they are
/// consumed (buffering, filtering, rendering).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Visible time window mapped across a frame's horizontal axis (seconds).
    pub time_window_secs: f64,
    /// Render loop cadence (frames per second).
    pub target_frame_rate: f64,
    /// Per-channel history capacity. Changing this reconstructs buffers.
    pub buffer_capacity_samples: usize,
    /// Ordered set of channels drawn each frame.
    pub visible_channel_ids: Vec<ChannelId>,
    /// Scale each channel lane to its own window peak instead of fixed gain.
    pub auto_gain: bool,
    /// Global gain applied on top of per-channel gain when auto-gain is off.
    pub gain_multiplier: f64,
    /// Subtract the window mean from each channel before mapping.
    pub baseline_correction: bool,
    /// High-pass cutoff (Hz).
    pub high_pass_hz: f64,
    /// Low-pass cutoff (Hz).
    pub low_pass_hz: f64,
    /// Enable the mains notch stage.
    pub notch_enabled: bool,
    /// Notch center frequency (Hz).
    pub notch_hz: f64,
    pub theme: Theme,
    /// Band partition used by the spectral analyzer.
    pub bands: Vec<FrequencyBand>,
    pub quality: QualityThresholds,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            time_window_secs: defaults::TIME_WINDOW_SECS,
            target_frame_rate: defaults::TARGET_FRAME_RATE,
            buffer_capacity_samples: defaults::BUFFER_CAPACITY_SAMPLES,
            visible_channel_ids: Vec::new(),
            auto_gain: true,
            gain_multiplier: 1.0,
            baseline_correction: true,
            high_pass_hz: defaults::HIGH_PASS_HZ,
            low_pass_hz: defaults::LOW_PASS_HZ,
            notch_enabled: false,
            notch_hz: defaults::NOTCH_HZ,
            theme: Theme::Dark,
            bands: default_bands(),
            quality: QualityThresholds::default(),
        }
    }
}

impl StreamConfig {
    /// Load configuration using the documented precedence order.
    ///
    /// Missing files fall back to defaults; a present-but-invalid file is an
    /// error — silently ignoring a broken config hides operator mistakes.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("WAVESCOPE_CONFIG") {
            tracing::info!(path = %path, "Loading config from WAVESCOPE_CONFIG");
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new("wavescope.toml");
        if local.exists() {
            tracing::info!("Loading config from ./wavescope.toml");
            return Self::from_file(local);
        }
        tracing::info!("No config file found — using built-in defaults");
        Ok(Self::default())
    }

    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration as a whole.
    ///
    /// Fatal invariant violations (non-positive capacity, window, or frame
    /// rate) are rejected here, at construction/update time, never deferred
    /// to first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity_samples == 0 {
            return Err(ConfigError::InvalidBufferCapacity(0));
        }
        if !self.time_window_secs.is_finite() || self.time_window_secs <= 0.0 {
            return Err(ConfigError::InvalidTimeWindow(self.time_window_secs));
        }
        if !self.target_frame_rate.is_finite() || self.target_frame_rate <= 0.0 {
            return Err(ConfigError::InvalidFrameRate(self.target_frame_rate));
        }
        if !self.gain_multiplier.is_finite() || self.gain_multiplier <= 0.0 {
            return Err(ConfigError::InvalidGain(self.gain_multiplier));
        }
        if self.high_pass_hz <= 0.0 || self.low_pass_hz <= self.high_pass_hz {
            return Err(ConfigError::InvalidCutoffs {
                high_pass: self.high_pass_hz,
                low_pass: self.low_pass_hz,
            });
        }
        validate_bands(&self.bands)?;
        Ok(())
    }

    /// True when `other` requires rebuilding filter coefficients.
    pub fn filters_differ(&self, other: &Self) -> bool {
        self.high_pass_hz != other.high_pass_hz
            || self.low_pass_hz != other.low_pass_hz
            || self.notch_enabled != other.notch_enabled
            || self.notch_hz != other.notch_hz
    }

    /// True when `other` requires reconstructing history buffers.
    pub fn buffers_differ(&self, other: &Self) -> bool {
        self.buffer_capacity_samples != other.buffer_capacity_samples
    }
}

/// Bands must individually be well-formed and collectively sorted and
/// non-overlapping, otherwise normalization is not well-defined.
fn validate_bands(bands: &[FrequencyBand]) -> Result<(), ConfigError> {
    for band in bands {
        if !band.low_hz.is_finite()
            || !band.high_hz.is_finite()
            || band.low_hz < 0.0
            || band.high_hz <= band.low_hz
        {
            return Err(ConfigError::InvalidBandRange {
                name: band.name.clone(),
                low: band.low_hz,
                high: band.high_hz,
            });
        }
    }
    for pair in bands.windows(2) {
        if pair[1].low_hz < pair[0].high_hz {
            return Err(ConfigError::OverlappingBands {
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Partial updates
// ============================================================================

/// Partial configuration update accepted by `update_config`.
///
/// Only the fields present are changed; the merged result is validated as a
/// whole before it replaces the active configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub time_window_secs: Option<f64>,
    pub target_frame_rate: Option<f64>,
    pub buffer_capacity_samples: Option<usize>,
    pub visible_channel_ids: Option<Vec<ChannelId>>,
    pub auto_gain: Option<bool>,
    pub gain_multiplier: Option<f64>,
    pub baseline_correction: Option<bool>,
    pub high_pass_hz: Option<f64>,
    pub low_pass_hz: Option<f64>,
    pub notch_enabled: Option<bool>,
    pub notch_hz: Option<f64>,
    pub theme: Option<Theme>,
    pub bands: Option<Vec<FrequencyBand>>,
    pub quality: Option<QualityThresholds>,
}

impl ConfigPatch {
    /// Merge this patch over `base`, returning a validated new config.
    pub fn apply(&self, base: &StreamConfig) -> Result<StreamConfig, ConfigError> {
        let mut next = base.clone();
        if let Some(v) = self.time_window_secs {
            next.time_window_secs = v;
        }
        if let Some(v) = self.target_frame_rate {
            next.target_frame_rate = v;
        }
        if let Some(v) = self.buffer_capacity_samples {
            next.buffer_capacity_samples = v;
        }
        if let Some(v) = &self.visible_channel_ids {
            next.visible_channel_ids = v.clone();
        }
        if let Some(v) = self.auto_gain {
            next.auto_gain = v;
        }
        if let Some(v) = self.gain_multiplier {
            next.gain_multiplier = v;
        }
        if let Some(v) = self.baseline_correction {
            next.baseline_correction = v;
        }
        if let Some(v) = self.high_pass_hz {
            next.high_pass_hz = v;
        }
        if let Some(v) = self.low_pass_hz {
            next.low_pass_hz = v;
        }
        if let Some(v) = self.notch_enabled {
            next.notch_enabled = v;
        }
        if let Some(v) = self.notch_hz {
            next.notch_hz = v;
        }
        if let Some(v) = self.theme {
            next.theme = v;
        }
        if let Some(v) = &self.bands {
            next.bands = v.clone();
        }
        if let Some(v) = self.quality {
            next.quality = v;
        }
        next.validate()?;
        Ok(next)
    }
}
