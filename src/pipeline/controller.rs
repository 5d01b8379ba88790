//! Stream controller: lifecycle, configuration mutation, metrics, export.
//!
//! The controller is the single owner of the pipeline aggregate. External
//! collaborators interact only through its narrow methods and receive
//! copies/snapshots, never references into internal buffers.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ConfigPatch, StreamConfig};
use crate::error::{ConfigError, PipelineError};
use crate::export::{self, ExportFormat, ExportSelection};
use crate::render::RenderLoop;
use crate::source::SampleSource;
use crate::types::{
    BandPower, Channel, ChannelId, RenderFrame, SessionStats, StreamMetrics,
};

use super::sample_loop::SampleLoop;
use super::state::{PipelineShared, StreamState};

/// Handles for one streaming session's background tasks.
struct Session {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Owner of buffers, filter state, metrics, and the two pipeline loops.
///
/// All lifecycle calls return once the state transition is accepted; they do
/// not wait for the pipeline to settle.
pub struct StreamController {
    shared: Arc<RwLock<PipelineShared>>,
    config: Arc<ArcSwap<StreamConfig>>,
    frame_tx: watch::Sender<Option<RenderFrame>>,
    session: Mutex<Option<Session>>,
}

impl StreamController {
    /// Build a controller from a validated configuration and channel set.
    ///
    /// Fails fast on an invalid configuration; nothing is constructed
    /// partially.
    pub fn new(config: StreamConfig, channels: Vec<Channel>) -> Result<Self, PipelineError> {
        config.validate()?;
        let shared = PipelineShared::new(&config, channels)?;
        let (frame_tx, _) = watch::channel(None);
        Ok(Self {
            shared: Arc::new(RwLock::new(shared)),
            config: Arc::new(ArcSwap::from_pointee(config)),
            frame_tx,
            session: Mutex::new(None),
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Begin streaming from `source`.
    ///
    /// Valid from `Idle` or `Stopped`; moves to `Connecting` and spawns the
    /// sample and render loops. The transition to `Streaming` happens on the
    /// first successful sample; a source failure before that returns the
    /// state machine to `Idle` with the error reason attached.
    pub async fn start<S: SampleSource>(&self, source: S) -> Result<(), PipelineError> {
        let mut session = self.session.lock().await;

        {
            let mut shared = self.shared.write().await;
            match shared.state {
                StreamState::Idle | StreamState::Stopped => {}
                state => {
                    return Err(PipelineError::InvalidState {
                        state: state.name(),
                        operation: "start",
                    });
                }
            }
            shared.state = StreamState::Connecting;
            shared.last_error = None;
            shared.stats = SessionStats::default();
            shared.last_sequence = None;
            shared.last_arrival = None;
            shared.mean_interarrival = None;
            shared.sequences_missed = 0;
            shared.started_at = Some(Instant::now());
        }

        // A session that ended on its own (source Eof or failure) never had
        // its token cancelled; its render loop is still sleeping until the
        // next tick. Cancel it before spawning replacements so two loops
        // never run against the same shared state.
        if let Some(previous) = session.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let sample_task = tokio::spawn(
            SampleLoop::new(
                Arc::clone(&self.shared),
                Arc::clone(&self.config),
                cancel.clone(),
            )
            .run(source),
        );
        let render_task = tokio::spawn(
            RenderLoop::new(
                Arc::clone(&self.shared),
                Arc::clone(&self.config),
                self.frame_tx.clone(),
                cancel.clone(),
            )
            .run(),
        );

        *session = Some(Session {
            cancel,
            tasks: vec![sample_task, render_task],
        });

        info!("Stream start accepted");
        Ok(())
    }

    /// Stop streaming, preserving buffered history until `clear()`.
    ///
    /// After this returns, no further buffer mutation happens: the state is
    /// flipped under the same write lock the sample loop must take to write,
    /// and both loops observe the cancellation on their next tick.
    pub async fn stop(&self) {
        {
            let mut shared = self.shared.write().await;
            match shared.state {
                StreamState::Streaming | StreamState::Connecting => {
                    shared.state = StreamState::Stopped;
                }
                _ => {}
            }
            shared.metrics.is_connected = false;
            shared.metrics.is_streaming = false;
            shared.stats.uptime_secs = shared.uptime_secs();
        }

        let mut session = self.session.lock().await;
        if let Some(s) = session.take() {
            s.cancel.cancel();
            // Tasks tear themselves down; handles are detached rather than
            // awaited so stop() stays synchronous from the caller's view.
            drop(s.tasks);
        }
        info!("Stream stopped");
    }

    /// Discard all buffered history and filter state, in any lifecycle
    /// state. Does not change the state machine.
    pub async fn clear(&self) {
        let mut shared = self.shared.write().await;
        shared.clear();
        info!("Buffers and filter state cleared");
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Apply a partial configuration update.
    ///
    /// The merged config is validated as a whole; on error the running
    /// pipeline is left unchanged. Accepted updates are swapped in atomically
    /// and picked up at the start of the next sample/render cycle. When no
    /// stream is running, structural changes (buffer capacity, filter
    /// cutoffs) are applied immediately since no cycle is in flight.
    pub async fn update_config(&self, patch: ConfigPatch) -> Result<(), PipelineError> {
        let current = self.config.load_full();
        let next = patch.apply(&current)?;

        let mut shared = self.shared.write().await;
        let streaming = matches!(
            shared.state,
            StreamState::Streaming | StreamState::Connecting
        );
        if !streaming {
            if current.filters_differ(&next) {
                shared.rebuild_filters(&next);
            }
            if current.buffers_differ(&next) {
                shared.rebuild_buffers(&next)?;
            }
        }
        self.config.store(Arc::new(next));
        Ok(())
    }

    /// The active configuration (copy-on-read).
    pub fn config(&self) -> Arc<StreamConfig> {
        self.config.load_full()
    }

    /// Enable or disable a channel.
    ///
    /// Disabling retains the channel's buffer and filter state; re-enabling
    /// resumes with prior history intact.
    pub async fn set_channel_active(
        &self,
        id: ChannelId,
        active: bool,
    ) -> Result<(), PipelineError> {
        let mut shared = self.shared.write().await;
        let channel = shared
            .channels
            .get_mut(&id)
            .ok_or(ConfigError::UnknownChannel(id))?;
        channel.active = active;
        Ok(())
    }

    /// Change a channel's pre-filter gain.
    pub async fn set_channel_gain(&self, id: ChannelId, gain: f64) -> Result<(), PipelineError> {
        if !gain.is_finite() || gain <= 0.0 {
            return Err(ConfigError::InvalidGain(gain).into());
        }
        let mut shared = self.shared.write().await;
        let channel = shared
            .channels
            .get_mut(&id)
            .ok_or(ConfigError::UnknownChannel(id))?;
        channel.gain = gain;
        Ok(())
    }

    // ========================================================================
    // Read model
    // ========================================================================

    /// Latest `count` stored (filtered) values for `channel`, oldest first.
    /// Unknown or never-activated channels read as empty.
    pub async fn latest(&self, channel: ChannelId, count: usize) -> Vec<f64> {
        self.shared.read().await.bank.latest(channel, count)
    }

    /// Current stream metrics (copy).
    pub async fn status(&self) -> StreamMetrics {
        self.shared.read().await.metrics
    }

    /// Session counters (copy), with uptime refreshed.
    pub async fn stats(&self) -> SessionStats {
        let shared = self.shared.read().await;
        let mut stats = shared.stats;
        if shared.metrics.is_streaming {
            stats.uptime_secs = shared.uptime_secs();
        }
        stats
    }

    pub async fn state(&self) -> StreamState {
        self.shared.read().await.state
    }

    /// Reason for the most recent failure transition, if any.
    pub async fn last_error(&self) -> Option<String> {
        self.shared.read().await.last_error.clone()
    }

    /// Configured channels (copies), in id order.
    pub async fn channels(&self) -> Vec<Channel> {
        self.shared.read().await.channels.values().cloned().collect()
    }

    /// Recent band-power rows, oldest first.
    pub async fn band_history(&self) -> Vec<Vec<BandPower>> {
        self.shared
            .read()
            .await
            .band_history
            .iter()
            .cloned()
            .collect()
    }

    /// Subscribe to rendered frames. The receiver always holds the latest
    /// complete frame (or `None` before the first one).
    pub fn frames(&self) -> watch::Receiver<Option<RenderFrame>> {
        self.frame_tx.subscribe()
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Serialize the buffered (already filtered) history at call time.
    ///
    /// Exactly the stored values are exported — raw data is not re-filtered.
    pub async fn export_window(
        &self,
        format: ExportFormat,
        selection: ExportSelection,
    ) -> Result<Vec<u8>, PipelineError> {
        let shared = self.shared.read().await;
        for id in &selection.channel_ids {
            if !shared.channels.contains_key(id) {
                return Err(ConfigError::UnknownChannel(*id).into());
            }
        }
        let config = self.config.load_full();
        export::export_window(&shared, &config, format, &selection)
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ReplaySource, SyntheticConfig, SyntheticSource};
    use crate::types::Sample;
    use std::time::Duration;

    fn controller(channels: u32) -> StreamController {
        let chans = (0..channels).map(|i| Channel::new(i, format!("ch{i}"))).collect();
        StreamController::new(StreamConfig::default(), chans).expect("valid defaults")
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let c = controller(1);
        let source = SyntheticSource::with_seed(
            SyntheticConfig {
                channels: 1,
                ..Default::default()
            },
            1,
        );
        c.start(source).await.expect("first start");
        let second = SyntheticSource::with_seed(
            SyntheticConfig {
                channels: 1,
                ..Default::default()
            },
            2,
        );
        assert!(matches!(
            c.start(second).await,
            Err(PipelineError::InvalidState { .. })
        ));
        c.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_harmless() {
        let c = controller(1);
        c.stop().await;
        assert_eq!(c.state().await, StreamState::Idle);
    }

    #[tokio::test]
    async fn test_connection_failure_returns_to_idle_with_reason() {
        struct FailingSource;
        #[async_trait::async_trait]
        impl SampleSource for FailingSource {
            async fn next_sample(&mut self) -> anyhow::Result<crate::source::SourceEvent> {
                Err(anyhow::anyhow!("device unreachable"))
            }
            fn source_name(&self) -> &str {
                "failing"
            }
        }

        let c = controller(1);
        c.start(FailingSource).await.expect("start accepted");
        // Give the sample loop a tick to observe the failure.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(c.state().await, StreamState::Idle);
        let reason = c.last_error().await.expect("error reason attached");
        assert!(reason.contains("unreachable"));
        // Retry is allowed from Idle.
        let replay = ReplaySource::new(
            vec![Sample::new(vec![1.0], 256.0, 0)],
            Duration::ZERO,
        );
        c.start(replay).await.expect("retry accepted");
        c.stop().await;
    }

    #[tokio::test]
    async fn test_update_config_rejects_invalid_patch_atomically() {
        let c = controller(1);
        let before = c.config();
        let patch = ConfigPatch {
            low_pass_hz: Some(0.1), // below high-pass: invalid pair
            ..Default::default()
        };
        assert!(c.update_config(patch).await.is_err());
        assert_eq!(*c.config(), *before);
    }

    #[tokio::test]
    async fn test_unknown_channel_calls_rejected() {
        let c = controller(2);
        assert!(c.set_channel_active(9, false).await.is_err());
        assert!(c.set_channel_gain(9, 2.0).await.is_err());
        assert!(c.set_channel_gain(0, -1.0).await.is_err());
        c.set_channel_active(1, false).await.expect("known channel");
    }
}
