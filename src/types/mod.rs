//! Core data model: samples, channels, quality snapshots, spectrum
//! summaries, stream metrics, and render frames.

mod channel;
mod frame;
mod metrics;
mod quality;
mod sample;
mod spectrum;

pub use channel::{Channel, ChannelPosition};
pub use frame::{BandBar, Polyline, RenderFrame};
pub use metrics::{SessionStats, StreamMetrics};
pub use quality::{ArtifactFlags, ChannelQuality, QualitySnapshot};
pub use sample::{ChannelId, Sample};
pub use spectrum::{default_bands, BandPower, FrequencyBand, SpectrumSummary};
