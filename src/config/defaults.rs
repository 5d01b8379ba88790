//! System-wide default constants.
//!
//! Centralises the pipeline's magic numbers, grouped by subsystem.

// ============================================================================
// Buffering
// ============================================================================

/// Default per-channel history capacity (samples).
///
/// 2 560 = 10 s at the 256 Hz default rate.
pub const BUFFER_CAPACITY_SAMPLES: usize = 2_560;

/// Default nominal sample rate assumed before the first sample arrives (Hz).
pub const NOMINAL_SAMPLE_RATE_HZ: f64 = 256.0;

// ============================================================================
// Rendering
// ============================================================================

/// Default visible time window (seconds).
pub const TIME_WINDOW_SECS: f64 = 4.0;

/// Default render cadence (frames per second).
pub const TARGET_FRAME_RATE: f64 = 30.0;

// ============================================================================
// Filtering
// ============================================================================

/// Default high-pass cutoff (Hz). Removes DC drift and slow baseline wander.
pub const HIGH_PASS_HZ: f64 = 0.5;

/// Default low-pass cutoff (Hz).
pub const LOW_PASS_HZ: f64 = 50.0;

/// Mains notch center frequency (Hz).
pub const NOTCH_HZ: f64 = 50.0;

/// Notch quality factor. High Q keeps the notch narrow.
pub const NOTCH_Q: f64 = 30.0;

/// Butterworth Q (1/sqrt(2)) for the high/low-pass stages.
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

// ============================================================================
// Quality thresholds (heuristic defaults, not physical constants)
// ============================================================================

/// Peak amplitude beyond which a blink-like transient is flagged (µV).
pub const BLINK_PEAK_THRESHOLD: f64 = 100.0;

/// Sustained RMS beyond which muscle-like activity is flagged (µV).
pub const MUSCLE_RMS_THRESHOLD: f64 = 50.0;

/// Peak amplitude beyond which an electrode-pop-like spike is flagged (µV).
pub const ELECTRODE_POP_THRESHOLD: f64 = 200.0;

/// RMS beyond which broadband environmental noise is flagged (µV).
pub const ENVIRONMENTAL_RMS_THRESHOLD: f64 = 80.0;

/// Hard saturation ceiling (µV). Peaks at or beyond this are amplifier
/// overload, not signal.
pub const SATURATION_THRESHOLD: f64 = 500.0;

// ============================================================================
// Metrics smoothing
// ============================================================================

/// Exponential smoothing factor for data rate / latency / jitter metrics.
pub const METRICS_EWMA_ALPHA: f64 = 0.1;

// ============================================================================
// Band-power history
// ============================================================================

/// Rows of band-power history retained for trend display.
pub const BAND_HISTORY_ROWS: usize = 300;
