//! Sample-arrival loop: source → filter chain → history buffers.
//!
//! Paced by the source's own cadence and cancelled through a
//! `CancellationToken`; it never waits on rendering. Each sample is
//! processed under one short write lock, so a synchronous `stop()` (which
//! flips the state under the same lock) guarantees no buffer mutation lands
//! after it returns.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{defaults, StreamConfig};
use crate::filters::FilterChain;
use crate::source::{SampleSource, SourceEvent};
use crate::types::Sample;

use super::state::{PipelineShared, StreamState};

pub struct SampleLoop {
    shared: Arc<RwLock<PipelineShared>>,
    config: Arc<ArcSwap<StreamConfig>>,
    cancel: CancellationToken,
    /// Config pointer seen at the last cycle; a swap means an update to
    /// apply before processing the next sample.
    active_config: Arc<StreamConfig>,
}

impl SampleLoop {
    pub fn new(
        shared: Arc<RwLock<PipelineShared>>,
        config: Arc<ArcSwap<StreamConfig>>,
        cancel: CancellationToken,
    ) -> Self {
        let active_config = config.load_full();
        Self {
            shared,
            config,
            cancel,
            active_config,
        }
    }

    /// Run until the source ends, fails, or cancellation fires.
    pub async fn run<S: SampleSource>(mut self, mut source: S) {
        info!(source = source.source_name(), "Sample loop started");

        loop {
            let event = tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("Sample loop cancelled");
                    break;
                }
                result = source.next_sample() => match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        // Connection fault: surface as a transition to Idle
                        // with the reason attached. The caller may retry
                        // start(); buffered history is preserved.
                        warn!(error = %e, "Sample source failed");
                        let mut shared = self.shared.write().await;
                        shared.state = StreamState::Idle;
                        shared.last_error = Some(e.to_string());
                        shared.metrics.is_connected = false;
                        shared.metrics.is_streaming = false;
                        break;
                    }
                },
            };

            let sample = match event {
                SourceEvent::Sample(s) => s,
                SourceEvent::Eof => {
                    let mut shared = self.shared.write().await;
                    info!(
                        samples = shared.stats.samples_processed,
                        "Sample source exhausted"
                    );
                    shared.state = StreamState::Stopped;
                    shared.metrics.is_connected = false;
                    shared.metrics.is_streaming = false;
                    break;
                }
            };

            self.apply_config_updates().await;

            let mut shared = self.shared.write().await;
            ingest(&mut shared, &self.active_config, sample);
        }
    }

    /// Apply any config swap at the start of the cycle, never mid-cycle.
    async fn apply_config_updates(&mut self) {
        let latest = self.config.load_full();
        if Arc::ptr_eq(&latest, &self.active_config) {
            return;
        }
        let mut shared = self.shared.write().await;
        if self.active_config.filters_differ(&latest) {
            shared.rebuild_filters(&latest);
            debug!("Filter chains rebuilt for updated cutoffs");
        }
        if self.active_config.buffers_differ(&latest) {
            // Validated upstream; a broken capacity cannot reach here, but
            // refuse to wipe buffers if it somehow does.
            if let Err(e) = shared.rebuild_buffers(&latest) {
                warn!(error = %e, "Buffer reconstruction skipped");
            } else {
                debug!(
                    capacity = latest.buffer_capacity_samples,
                    "History buffers reconstructed"
                );
            }
        }
        self.active_config = latest;
    }
}

/// Filter and store one sample, updating stream metrics.
///
/// Shared by the loop and by tests that drive the pipeline synchronously.
pub fn ingest(shared: &mut PipelineShared, config: &StreamConfig, sample: Sample) {
    match shared.state {
        StreamState::Connecting => {
            // First successful sample completes the connection.
            shared.state = StreamState::Streaming;
            shared.metrics.is_connected = true;
            shared.metrics.is_streaming = true;
            shared.last_error = None;
            info!(rate = sample.sample_rate, "Stream established");
        }
        StreamState::Streaming => {}
        // A pending sample delivered after stop() (or before start) is
        // dropped, not buffered.
        StreamState::Idle | StreamState::Stopped => {
            shared.stats.samples_dropped += 1;
            return;
        }
    }

    if sample.sample_rate > 0.0 && sample.sample_rate != shared.sample_rate {
        shared.sample_rate = sample.sample_rate;
        shared.rebuild_filters(config);
    }

    let active = shared.active_channel_ids();
    if sample.values.len() != active.len() {
        // Channel-set mismatch is a transient data fault: count it as loss,
        // keep streaming.
        shared.stats.samples_dropped += 1;
        debug!(
            got = sample.values.len(),
            expected = active.len(),
            "Sample dropped: channel count mismatch"
        );
        return;
    }

    update_metrics(shared, &sample);

    let rate = shared.sample_rate;
    for (id, raw) in active.into_iter().zip(sample.values.iter().copied()) {
        let gain = shared.channels.get(&id).map_or(1.0, |c| c.gain);
        let chain = shared
            .filters
            .entry(id)
            .or_insert_with(|| FilterChain::from_config(config, rate));
        let filtered = chain.process(raw * gain);
        shared.bank.push(id, filtered);
    }

    shared.stats.samples_processed += 1;
    shared.last_timestamp = Some(sample.timestamp);
    shared.metrics.buffer_fill_ratio = shared.bank.max_fill_ratio();
}

/// Exponentially smoothed rate/latency/jitter plus sequence-gap loss.
fn update_metrics(shared: &mut PipelineShared, sample: &Sample) {
    let alpha = defaults::METRICS_EWMA_ALPHA;
    let now = Instant::now();

    if let Some(prev) = shared.last_arrival {
        let dt = now.duration_since(prev).as_secs_f64();
        if dt > 0.0 {
            let mean = shared.mean_interarrival.unwrap_or(dt);
            let mean = mean + alpha * (dt - mean);
            shared.mean_interarrival = Some(mean);
            shared.metrics.data_rate_hz = if mean > 0.0 { 1.0 / mean } else { 0.0 };

            let deviation_ms = (dt - mean).abs() * 1_000.0;
            shared.metrics.jitter_ms += alpha * (deviation_ms - shared.metrics.jitter_ms);
        }
    }
    shared.last_arrival = Some(now);

    let latency_ms = (chrono::Utc::now() - sample.timestamp)
        .num_microseconds()
        .map_or(0.0, |us| us as f64 / 1_000.0)
        .max(0.0);
    shared.metrics.average_latency_ms +=
        alpha * (latency_ms - shared.metrics.average_latency_ms);

    if let Some(last_seq) = shared.last_sequence {
        if sample.sequence > last_seq + 1 {
            shared.sequences_missed += sample.sequence - last_seq - 1;
        }
    }
    shared.last_sequence = Some(sample.sequence);

    let received = shared.stats.samples_processed + 1;
    let missed = shared.sequences_missed;
    shared.metrics.packet_loss_ratio = if missed > 0 {
        missed as f64 / (missed + received) as f64
    } else {
        0.0
    };
}
