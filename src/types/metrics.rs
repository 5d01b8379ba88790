//! Stream status and throughput metrics exposed to external collaborators.

use serde::{Deserialize, Serialize};

/// Read model polled by dashboards and observability collaborators.
///
/// Mutated continuously by the stream controller as samples arrive and frames
/// render; consumers only ever see copies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamMetrics {
    pub is_connected: bool,
    pub is_streaming: bool,
    /// Effective sample arrival rate (Hz), exponentially smoothed.
    pub data_rate_hz: f64,
    /// Fraction of sequence numbers never received, 0–1.
    pub packet_loss_ratio: f64,
    /// Smoothed capture-to-ingest latency (ms).
    pub average_latency_ms: f64,
    /// Smoothed inter-arrival deviation (ms).
    pub jitter_ms: f64,
    /// Fill ratio of the fullest channel buffer, 0–1.
    pub buffer_fill_ratio: f64,
}

/// Session counters accumulated since the last `start()`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub samples_processed: u64,
    pub samples_dropped: u64,
    pub frames_rendered: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_default_is_idle() {
        let m = StreamMetrics::default();
        assert!(!m.is_connected);
        assert!(!m.is_streaming);
        assert_eq!(m.packet_loss_ratio, 0.0);
    }
}
