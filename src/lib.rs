//! Wavescope: real-time multichannel signal pipeline.
//!
//! Ingests timestamped multichannel samples at a bounded rate and produces a
//! renderable, quality-annotated, frequency-analyzed view of recent history.
//!
//! ## Architecture
//!
//! - **Source**: pluggable sample producers (synthetic, replay)
//! - **Filters**: causal per-channel biquad chain (high-pass, low-pass, notch)
//! - **Buffer**: fixed-capacity per-channel history rings
//! - **Quality**: heuristic artifact flags and 0–100 scoring
//! - **Spectral**: FFT band-power summarization
//! - **Render**: frame-paced coordinate mapping, decoupled from arrival rate
//! - **Pipeline**: the stream controller owning lifecycle, config, metrics

pub mod buffer;
pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod pipeline;
pub mod quality;
pub mod render;
pub mod source;
pub mod spectral;
pub mod types;

// Re-export the boundary surface consumed by external collaborators.
pub use config::{ConfigPatch, QualityThresholds, StreamConfig, Theme};
pub use error::{ConfigError, PipelineError};
pub use export::{ExportFormat, ExportSelection};
pub use pipeline::{StreamController, StreamState};
pub use source::{ReplaySource, SampleSource, SourceEvent, SyntheticConfig, SyntheticSource};
pub use types::{
    ArtifactFlags, BandPower, Channel, ChannelId, ChannelQuality, FrequencyBand, QualitySnapshot,
    RenderFrame, Sample, SessionStats, SpectrumSummary, StreamMetrics,
};
