//! Spectral analysis: windowed power spectrum and band-power summarization.
//!
//! Uses a pre-planned FFT (rustfft) over a Hann-windowed slice of history,
//! keeps the Nyquist-limited half-spectrum, and aggregates power into the
//! configured frequency bands.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::types::{BandPower, FrequencyBand, SpectrumSummary};

/// Power below this total is treated as silence (avoids NaN from 0/0).
const SILENCE_EPSILON: f64 = 1e-12;

/// FFT-backed analyzer with plan caching.
///
/// Plans are reused while the transform size is stable, which it is in
/// steady state (fixed analysis window).
pub struct SpectralAnalyzer {
    planner: FftPlanner<f64>,
    cached: Option<(usize, Arc<dyn Fft<f64>>)>,
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            cached: None,
        }
    }

    /// Analyze one window of samples.
    ///
    /// Returns a degenerate zero summary (never NaN) for empty or all-zero
    /// windows. Band edges beyond Nyquist clip silently to the valid range.
    pub fn analyze(
        &mut self,
        window: &[f64],
        sample_rate: f64,
        bands: &[FrequencyBand],
    ) -> SpectrumSummary {
        if window.len() < 2 || sample_rate <= 0.0 {
            return SpectrumSummary::silent(sample_rate, bands);
        }

        let fft_size = window.len().next_power_of_two();
        let fft = self.plan(fft_size);

        // Hann window over the real samples, zero-padded to the FFT size.
        let n = window.len();
        let mut buf: Vec<Complex<f64>> = Vec::with_capacity(fft_size);
        for (i, &x) in window.iter().enumerate() {
            let w = 0.5 * (1.0 - (2.0 * PI * i as f64 / (n - 1) as f64).cos());
            let x = if x.is_finite() { x } else { 0.0 };
            buf.push(Complex::new(x * w, 0.0));
        }
        buf.resize(fft_size, Complex::new(0.0, 0.0));

        fft.process(&mut buf);

        // One-sided power spectrum, DC through Nyquist.
        let half = fft_size / 2 + 1;
        let bin_hz = sample_rate / fft_size as f64;
        let norm = (n as f64).powi(2);
        let frequencies: Vec<f64> = (0..half).map(|i| i as f64 * bin_hz).collect();
        let power: Vec<f64> = buf[..half]
            .iter()
            .map(|c| c.norm_sqr() / norm)
            .collect();

        let total_power: f64 = power.iter().sum();
        if total_power <= SILENCE_EPSILON {
            let mut silent = SpectrumSummary::silent(sample_rate, bands);
            silent.frequencies = frequencies;
            silent.power = power;
            return silent;
        }

        let band_powers = aggregate_bands(&frequencies, &power, bands, sample_rate / 2.0);
        let (dominant, centroid, bandwidth) = summarize(&frequencies, &power);

        SpectrumSummary {
            frequencies,
            power,
            bands: band_powers,
            dominant_frequency: dominant,
            spectral_centroid: centroid,
            spectral_bandwidth: bandwidth,
            sample_rate,
        }
    }

    fn plan(&mut self, size: usize) -> Arc<dyn Fft<f64>> {
        match &self.cached {
            Some((cached_size, fft)) if *cached_size == size => Arc::clone(fft),
            _ => {
                let fft = self.planner.plan_fft_forward(size);
                self.cached = Some((size, Arc::clone(&fft)));
                fft
            }
        }
    }
}

/// Sum power per band (edges clipped to Nyquist) and normalize each band
/// against the total across all configured bands.
fn aggregate_bands(
    frequencies: &[f64],
    power: &[f64],
    bands: &[FrequencyBand],
    nyquist: f64,
) -> Vec<BandPower> {
    let mut absolutes: Vec<f64> = Vec::with_capacity(bands.len());
    for band in bands {
        let low = band.low_hz.min(nyquist);
        let high = band.high_hz.min(nyquist);
        let sum: f64 = frequencies
            .iter()
            .zip(power.iter())
            .filter(|(&f, _)| f >= low && f < high)
            .map(|(_, &p)| p)
            .sum();
        absolutes.push(sum);
    }

    let total: f64 = absolutes.iter().sum();
    bands
        .iter()
        .zip(absolutes)
        .map(|(band, absolute)| BandPower {
            band: band.clone(),
            absolute,
            relative: if total > SILENCE_EPSILON {
                absolute / total
            } else {
                0.0
            },
        })
        .collect()
}

/// Dominant frequency (argmax bin, DC excluded), spectral centroid, and
/// power-weighted bandwidth around the centroid.
fn summarize(frequencies: &[f64], power: &[f64]) -> (f64, f64, f64) {
    let dominant = frequencies
        .iter()
        .zip(power.iter())
        .skip(1) // DC is offset, not oscillation
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map_or(0.0, |(&f, _)| f);

    let total: f64 = power.iter().sum();
    let centroid = frequencies
        .iter()
        .zip(power.iter())
        .map(|(&f, &p)| f * p)
        .sum::<f64>()
        / total;

    let variance = frequencies
        .iter()
        .zip(power.iter())
        .map(|(&f, &p)| (f - centroid).powi(2) * p)
        .sum::<f64>()
        / total;

    (dominant, centroid, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::default_bands;

    fn sine(freq: f64, rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / rate).sin())
            .collect()
    }

    #[test]
    fn test_pure_tone_dominant_frequency() {
        let rate = 256.0;
        let mut analyzer = SpectralAnalyzer::new();
        let summary = analyzer.analyze(&sine(10.0, rate, 1024), rate, &default_bands());
        assert!(
            (summary.dominant_frequency - 10.0).abs() <= 0.5,
            "dominant {} Hz",
            summary.dominant_frequency
        );
    }

    #[test]
    fn test_alpha_tone_lands_in_alpha_band() {
        let rate = 256.0;
        let mut analyzer = SpectralAnalyzer::new();
        let summary = analyzer.analyze(&sine(10.0, rate, 1024), rate, &default_bands());
        let alpha = summary
            .bands
            .iter()
            .find(|b| b.band.name == "Alpha")
            .expect("alpha band");
        assert!(alpha.relative > 0.5, "alpha share {}", alpha.relative);
    }

    #[test]
    fn test_normalized_band_powers_sum_to_one() {
        let rate = 256.0;
        let mut analyzer = SpectralAnalyzer::new();
        // Mixed tones across several bands.
        let window: Vec<f64> = sine(6.0, rate, 1024)
            .iter()
            .zip(sine(10.0, rate, 1024))
            .zip(sine(20.0, rate, 1024))
            .map(|((a, b), c)| a + b + c)
            .collect();
        let summary = analyzer.analyze(&window, rate, &default_bands());
        let total: f64 = summary.bands.iter().map(|b| b.relative).sum();
        assert!((total - 1.0).abs() < 1e-9, "relative sum {total}");
    }

    #[test]
    fn test_all_zero_window_yields_zero_summary() {
        let mut analyzer = SpectralAnalyzer::new();
        let summary = analyzer.analyze(&[0.0; 512], 256.0, &default_bands());
        assert_eq!(summary.dominant_frequency, 0.0);
        assert_eq!(summary.spectral_centroid, 0.0);
        assert!(summary.power.iter().all(|&p| p == 0.0));
        assert!(summary.bands.iter().all(|b| b.relative == 0.0));
    }

    #[test]
    fn test_band_beyond_nyquist_clips() {
        let rate = 100.0; // Nyquist 50 Hz
        let mut analyzer = SpectralAnalyzer::new();
        let bands = vec![FrequencyBand::new("Wide", 0.5, 500.0)];
        let summary = analyzer.analyze(&sine(10.0, rate, 512), rate, &bands);
        assert!((summary.bands[0].relative - 1.0).abs() < 1e-9);
        assert!(summary.bands[0].absolute > 0.0);
    }

    #[test]
    fn test_centroid_tracks_tone() {
        let rate = 256.0;
        let mut analyzer = SpectralAnalyzer::new();
        let summary = analyzer.analyze(&sine(20.0, rate, 2048), rate, &default_bands());
        assert!(
            (summary.spectral_centroid - 20.0).abs() < 2.0,
            "centroid {}",
            summary.spectral_centroid
        );
        assert!(summary.spectral_bandwidth < 5.0);
    }

    #[test]
    fn test_empty_window_is_silent() {
        let mut analyzer = SpectralAnalyzer::new();
        let summary = analyzer.analyze(&[], 256.0, &default_bands());
        assert_eq!(summary.dominant_frequency, 0.0);
        assert!(summary.frequencies.is_empty());
    }
}
