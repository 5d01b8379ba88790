//! Sample source abstraction.
//!
//! A unified trait for producing timestamped multichannel samples from
//! different producers: a synthetic generator for demos and tests, and a
//! replay source for pre-captured data. Hardware or network producers plug
//! in behind the same trait.

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::time::Duration;

use crate::types::Sample;

/// Events produced by a sample source.
pub enum SourceEvent {
    /// A sample was produced.
    Sample(Sample),
    /// Source reached end of data (replay exhausted, producer closed).
    Eof,
}

/// Trait abstracting where samples come from.
///
/// Implementations handle pacing internally; the sample loop calls
/// [`next_sample`](SampleSource::next_sample) in a `select!` with
/// cancellation, so a slow source never delays shutdown.
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Produce the next sample, or `Eof` when no more data is available.
    ///
    /// `Err` means the source failed in a way it cannot recover from
    /// (surfaced by the controller as a connection fault).
    async fn next_sample(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging (e.g. "synthetic", "replay").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Replay source
// ============================================================================

/// Replays pre-captured samples with an optional inter-sample delay.
pub struct ReplaySource {
    samples: std::vec::IntoIter<Sample>,
    delay: Duration,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<Sample>, delay: Duration) -> Self {
        Self {
            samples: samples.into_iter(),
            delay,
            yielded_first: false,
        }
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn next_sample(&mut self) -> Result<SourceEvent> {
        // No delay before the first sample so startup is immediate.
        if self.yielded_first && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.samples.next() {
            Some(s) => {
                self.yielded_first = true;
                Ok(SourceEvent::Sample(s))
            }
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Synthetic source
// ============================================================================

/// Configuration for the synthetic generator.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub channels: usize,
    pub sample_rate: f64,
    /// Base tone amplitude per channel.
    pub amplitude: f64,
    /// Per-channel tone frequency starts here and steps by `tone_step_hz`.
    pub base_tone_hz: f64,
    pub tone_step_hz: f64,
    /// Standard deviation of additive Gaussian noise.
    pub noise_std: f64,
    /// Probability per sample of injecting a large artifact spike.
    pub artifact_probability: f64,
    /// Spike amplitude used when an artifact fires.
    pub artifact_amplitude: f64,
    /// When false, samples are produced as fast as the consumer asks
    /// (useful in tests); when true, pacing matches `sample_rate`.
    pub paced: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            sample_rate: 256.0,
            amplitude: 20.0,
            base_tone_hz: 10.0,
            tone_step_hz: 2.0,
            noise_std: 2.0,
            artifact_probability: 0.0,
            artifact_amplitude: 1_000.0,
            paced: true,
        }
    }
}

/// Multi-channel sine-plus-noise generator with optional artifact injection.
///
/// Deterministic for a given seed (modulo pacing), which keeps integration
/// tests reproducible.
pub struct SyntheticSource {
    config: SyntheticConfig,
    noise: Normal<f64>,
    rng: StdRng,
    tick: u64,
    interval: Option<tokio::time::Interval>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    pub fn with_seed(config: SyntheticConfig, seed: u64) -> Self {
        // A degenerate noise_std of 0 is allowed; Normal::new only fails on
        // NaN/negative, which the caller controls.
        let noise = Normal::new(0.0, config.noise_std.max(0.0))
            .unwrap_or_else(|_| Normal::new(0.0, 1.0).expect("unit normal"));
        let interval = config.paced.then(|| {
            let period = Duration::from_secs_f64(1.0 / config.sample_rate);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval
        });
        Self {
            config,
            noise,
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            interval,
        }
    }

    fn generate(&mut self) -> Sample {
        let t = self.tick as f64 / self.config.sample_rate;
        let mut values = Vec::with_capacity(self.config.channels);
        for ch in 0..self.config.channels {
            let tone_hz = self.config.base_tone_hz + ch as f64 * self.config.tone_step_hz;
            let mut v = self.config.amplitude * (2.0 * PI * tone_hz * t).sin()
                + self.noise.sample(&mut self.rng);
            if self.config.artifact_probability > 0.0
                && self.rng.gen_bool(self.config.artifact_probability.min(1.0))
            {
                v += self.config.artifact_amplitude;
            }
            values.push(v);
        }
        let sample = Sample::new(values, self.config.sample_rate, self.tick);
        self.tick += 1;
        sample
    }
}

#[async_trait]
impl SampleSource for SyntheticSource {
    async fn next_sample(&mut self) -> Result<SourceEvent> {
        if let Some(interval) = self.interval.as_mut() {
            interval.tick().await;
        }
        Ok(SourceEvent::Sample(self.generate()))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}
