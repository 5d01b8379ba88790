//! Spectrum summary types produced by the spectral analyzer.

use serde::{Deserialize, Serialize};

/// A named contiguous frequency range, `[low_hz, high_hz)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub fn new(name: impl Into<String>, low_hz: f64, high_hz: f64) -> Self {
        Self {
            name: name.into(),
            low_hz,
            high_hz,
        }
    }

    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.low_hz && freq < self.high_hz
    }
}

/// Conventional EEG-style band partition used as the configuration default.
pub fn default_bands() -> Vec<FrequencyBand> {
    vec![
        FrequencyBand::new("Delta", 0.5, 4.0),
        FrequencyBand::new("Theta", 4.0, 8.0),
        FrequencyBand::new("Alpha", 8.0, 13.0),
        FrequencyBand::new("Beta", 13.0, 30.0),
        FrequencyBand::new("Gamma", 30.0, 100.0),
    ]
}

/// Power aggregated over one configured band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPower {
    pub band: FrequencyBand,
    /// Summed power across the band's bins.
    pub absolute: f64,
    /// Share of the total power across all configured bands, 0–1.
    pub relative: f64,
}

/// Power spectrum plus derived summary statistics over one analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSummary {
    /// Frequency bin centers (Hz), DC through Nyquist.
    pub frequencies: Vec<f64>,
    /// Power at each bin.
    pub power: Vec<f64>,
    pub bands: Vec<BandPower>,
    /// Bin frequency with maximum power (0.0 for an all-zero window).
    pub dominant_frequency: f64,
    /// Power-weighted mean frequency.
    pub spectral_centroid: f64,
    /// Power-weighted standard deviation around the centroid.
    pub spectral_bandwidth: f64,
    /// Sample rate the window was captured at (Hz).
    pub sample_rate: f64,
}

impl SpectrumSummary {
    /// Degenerate summary for an empty or all-zero window.
    pub fn silent(sample_rate: f64, bands: &[FrequencyBand]) -> Self {
        Self {
            frequencies: Vec::new(),
            power: Vec::new(),
            bands: bands
                .iter()
                .map(|b| BandPower {
                    band: b.clone(),
                    absolute: 0.0,
                    relative: 0.0,
                })
                .collect(),
            dominant_frequency: 0.0,
            spectral_centroid: 0.0,
            spectral_bandwidth: 0.0,
            sample_rate,
        }
    }
}
