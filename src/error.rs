//! Pipeline error taxonomy.
//!
//! Transient data faults (non-finite samples, brief drops, momentary
//! saturation) are recovered locally and never surface here; these types
//! cover configuration faults, connection faults, and fatal construction
//! errors only.

use thiserror::Error;

/// Errors rejected at a configuration boundary.
///
/// A configuration error always leaves the running pipeline unchanged: the
/// offending update is refused in full, never partially applied.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("buffer capacity must be positive, got {0}")]
    InvalidBufferCapacity(i64),

    #[error("time window must be positive, got {0}")]
    InvalidTimeWindow(f64),

    #[error("target frame rate must be positive, got {0}")]
    InvalidFrameRate(f64),

    #[error("gain multiplier must be positive and finite, got {0}")]
    InvalidGain(f64),

    #[error("filter cutoffs must satisfy 0 < high_pass < low_pass, got high_pass={high_pass} low_pass={low_pass}")]
    InvalidCutoffs { high_pass: f64, low_pass: f64 },

    #[error("band '{name}' has invalid range [{low}, {high})")]
    InvalidBandRange { name: String, low: f64, high: f64 },

    #[error("bands '{first}' and '{second}' overlap or are out of order")]
    OverlappingBands { first: String, second: String },

    #[error("unknown channel id {0}")]
    UnknownChannel(u32),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors surfaced by the stream controller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("sample source connection failed: {0}")]
    ConnectionFailed(String),

    #[error("operation not valid in state {state}: {operation}")]
    InvalidState {
        state: &'static str,
        operation: &'static str,
    },

    #[error("export failed: {0}")]
    Export(String),
}
