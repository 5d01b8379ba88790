//! Streaming causal filter chain.
//!
//! Each stage is a second-order recursive (biquad) section with RBJ cookbook
//! coefficients, processed sample-by-sample in Direct Form I: the output at
//! step n depends only on inputs/outputs at steps <= n. Stages apply no
//! clamping — saturation detection belongs to the quality assessor.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::{defaults, StreamConfig};

// ============================================================================
// Coefficients
// ============================================================================

/// Normalized biquad coefficients (a0 divided out).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Second-order high-pass, RBJ audio EQ cookbook.
    pub fn high_pass(sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let omega = 2.0 * PI * cutoff_hz / sample_rate;
        let alpha = omega.sin() / (2.0 * q);
        let cos_omega = omega.cos();

        let b0 = (1.0 + cos_omega) / 2.0;
        let b1 = -(1.0 + cos_omega);
        let b2 = (1.0 + cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Second-order low-pass, RBJ audio EQ cookbook.
    pub fn low_pass(sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let omega = 2.0 * PI * cutoff_hz / sample_rate;
        let alpha = omega.sin() / (2.0 * q);
        let cos_omega = omega.cos();

        let b0 = (1.0 - cos_omega) / 2.0;
        let b1 = 1.0 - cos_omega;
        let b2 = (1.0 - cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Narrow band-reject notch. High Q keeps the stopband tight around the
    /// mains frequency.
    pub fn notch(sample_rate: f64, center_hz: f64, q: f64) -> Self {
        let omega = 2.0 * PI * center_hz / sample_rate;
        let alpha = omega.sin() / (2.0 * q);
        let cos_omega = omega.cos();

        let b0 = 1.0;
        let b1 = -2.0 * cos_omega;
        let b2 = 1.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

// ============================================================================
// Biquad stage
// ============================================================================

/// One causal second-order section with its recursive state.
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    // Direct Form I state: two previous inputs and outputs.
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Consume exactly one input, produce exactly one output.
    ///
    /// A non-finite input would poison the recursive state indefinitely, so
    /// the stage resets itself and emits a neutral zero for that step.
    pub fn process(&mut self, x: f64) -> f64 {
        if !x.is_finite() {
            self.reset();
            return 0.0;
        }

        let y = self.coeffs.b0 * x + self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        // Coefficient pathologies can still produce a non-finite output;
        // treat that the same way as poisoned input.
        if !y.is_finite() {
            self.reset();
            return 0.0;
        }

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    /// Discard recursive state. Old state is invalid under new coefficients,
    /// so reconfiguration always goes through here.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

// ============================================================================
// Per-channel chain
// ============================================================================

/// Ordered cascade applied to one channel: high-pass, then low-pass, then
/// the optional mains notch.
#[derive(Debug, Clone)]
pub struct FilterChain {
    stages: Vec<Biquad>,
    sample_rate: f64,
}

impl FilterChain {
    /// Build a chain for `sample_rate` from the active configuration.
    pub fn from_config(config: &StreamConfig, sample_rate: f64) -> Self {
        let q = defaults::BUTTERWORTH_Q;
        let mut stages = vec![
            Biquad::new(BiquadCoefficients::high_pass(
                sample_rate,
                config.high_pass_hz,
                q,
            )),
            Biquad::new(BiquadCoefficients::low_pass(
                sample_rate,
                config.low_pass_hz,
                q,
            )),
        ];
        if config.notch_enabled {
            stages.push(Biquad::new(BiquadCoefficients::notch(
                sample_rate,
                config.notch_hz,
                defaults::NOTCH_Q,
            )));
        }
        Self {
            stages,
            sample_rate,
        }
    }

    /// Run one value through every stage in order.
    pub fn process(&mut self, x: f64) -> f64 {
        self.stages.iter_mut().fold(x, |acc, stage| stage.process(acc))
    }

    /// Clear all recursive state without touching coefficients.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(sample_rate: f64) -> FilterChain {
        FilterChain::from_config(&StreamConfig::default(), sample_rate)
    }

    #[test]
    fn test_zero_in_zero_out() {
        // Causality: an all-zero signal stays all-zero regardless of cutoff.
        let mut c = chain(256.0);
        for _ in 0..1000 {
            assert_eq!(c.process(0.0), 0.0);
        }
    }

    #[test]
    fn test_nan_does_not_propagate() {
        let mut c = chain(256.0);
        for i in 0..100 {
            c.process((f64::from(i) * 0.1).sin());
        }
        assert_eq!(c.process(f64::NAN), 0.0);
        // Output recovers to finite (and decays to zero) within a bounded
        // number of steps after the poisoned sample.
        let mut last = f64::MAX;
        for _ in 0..500 {
            last = c.process(0.0);
            assert!(last.is_finite());
        }
        assert!(last.abs() < 1e-6);
    }

    #[test]
    fn test_infinity_resets_stage() {
        let mut c = chain(256.0);
        assert_eq!(c.process(f64::INFINITY), 0.0);
        assert!(c.process(1.0).is_finite());
    }

    #[test]
    fn test_high_pass_removes_dc() {
        let mut c = chain(256.0);
        let mut last = 0.0;
        for _ in 0..2000 {
            last = c.process(10.0);
        }
        // Constant input decays toward zero through the high-pass stage.
        assert!(last.abs() < 0.05, "dc residue {last}");
    }

    #[test]
    fn test_low_pass_attenuates_high_frequency() {
        let sample_rate = 256.0;
        let mut c = chain(sample_rate);
        let mut peak_out = 0.0_f64;
        for n in 0..2048 {
            let t = f64::from(n) / sample_rate;
            // 100 Hz tone, well above the 50 Hz default cutoff.
            let y = c.process((2.0 * PI * 100.0 * t).sin());
            if n > 512 {
                peak_out = peak_out.max(y.abs());
            }
        }
        assert!(peak_out < 0.3, "100 Hz leak {peak_out}");
    }

    #[test]
    fn test_passband_tone_survives() {
        let sample_rate = 256.0;
        let mut c = chain(sample_rate);
        let mut peak_out = 0.0_f64;
        for n in 0..2048 {
            let t = f64::from(n) / sample_rate;
            let y = c.process((2.0 * PI * 10.0 * t).sin());
            if n > 512 {
                peak_out = peak_out.max(y.abs());
            }
        }
        assert!(peak_out > 0.7, "10 Hz attenuated to {peak_out}");
    }

    #[test]
    fn test_notch_stage_added_when_enabled() {
        let config = StreamConfig {
            notch_enabled: true,
            ..Default::default()
        };
        let with_notch = FilterChain::from_config(&config, 256.0);
        let without = chain(256.0);
        assert_eq!(with_notch.stages.len(), without.stages.len() + 1);
    }
}
