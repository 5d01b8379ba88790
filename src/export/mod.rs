//! Window export: serialize buffered history for external consumers.
//!
//! Exports reflect exactly the filtered values stored in the buffers at call
//! time — raw data is never re-filtered. Per-value timestamps are
//! reconstructed from the newest sample's timestamp and the effective rate,
//! since rings store values, not instants.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::config::StreamConfig;
use crate::error::PipelineError;
use crate::pipeline::PipelineShared;
use crate::types::ChannelId;

/// Supported export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Delimited text: one timestamp column plus one column per channel.
    Csv,
    /// Structured JSON: per-channel value arrays with metadata.
    Json,
}

/// What to export.
#[derive(Debug, Clone, Default)]
pub struct ExportSelection {
    /// Channels to include; empty means every channel with buffered data.
    pub channel_ids: Vec<ChannelId>,
    /// Optional [start, end] filter on reconstructed timestamps.
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

#[derive(Serialize)]
struct JsonExport {
    sample_rate: f64,
    exported_at: DateTime<Utc>,
    channels: Vec<JsonChannel>,
}

#[derive(Serialize)]
struct JsonChannel {
    id: ChannelId,
    name: String,
    start_timestamp: Option<DateTime<Utc>>,
    values: Vec<f64>,
}

/// One channel's buffered window with reconstructed timestamps.
struct ChannelWindow {
    id: ChannelId,
    name: String,
    values: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
}

pub fn export_window(
    shared: &PipelineShared,
    config: &StreamConfig,
    format: ExportFormat,
    selection: &ExportSelection,
) -> Result<Vec<u8>, PipelineError> {
    let ids: Vec<ChannelId> = if selection.channel_ids.is_empty() {
        shared.bank.channel_ids()
    } else {
        selection.channel_ids.clone()
    };

    let windows: Vec<ChannelWindow> = ids
        .into_iter()
        .map(|id| collect_channel(shared, config, id, selection.time_range))
        .collect();

    match format {
        ExportFormat::Csv => Ok(to_csv(&windows)),
        ExportFormat::Json => {
            let doc = JsonExport {
                sample_rate: shared.sample_rate,
                exported_at: Utc::now(),
                channels: windows
                    .into_iter()
                    .map(|w| JsonChannel {
                        id: w.id,
                        name: w.name,
                        start_timestamp: w.timestamps.first().copied(),
                        values: w.values,
                    })
                    .collect(),
            };
            serde_json::to_vec_pretty(&doc).map_err(|e| PipelineError::Export(e.to_string()))
        }
    }
}

fn collect_channel(
    shared: &PipelineShared,
    config: &StreamConfig,
    id: ChannelId,
    time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> ChannelWindow {
    let name = shared
        .channels
        .get(&id)
        .map_or_else(|| format!("ch{id}"), |c| c.name.clone());
    let values = shared.bank.latest(id, config.buffer_capacity_samples);
    let timestamps = reconstruct_timestamps(shared, values.len());

    let (values, timestamps) = match time_range {
        Some((start, end)) => timestamps
            .iter()
            .zip(values)
            .filter(|(ts, _)| **ts >= start && **ts <= end)
            .map(|(ts, v)| (v, *ts))
            .unzip(),
        None => (values, timestamps),
    };

    ChannelWindow {
        id,
        name,
        values,
        timestamps,
    }
}

/// Timestamps for `n` buffered values ending at the last ingest instant.
fn reconstruct_timestamps(shared: &PipelineShared, n: usize) -> Vec<DateTime<Utc>> {
    let Some(end) = shared.last_timestamp else {
        return Vec::new();
    };
    let rate = shared.sample_rate.max(f64::MIN_POSITIVE);
    (0..n)
        .map(|i| {
            let back_us = ((n - 1 - i) as f64 / rate * 1e6).round() as i64;
            end - ChronoDuration::microseconds(back_us)
        })
        .collect()
}

/// Wide CSV: one row per slot, channels right-aligned so the newest values
/// of every channel share the final row.
fn to_csv(windows: &[ChannelWindow]) -> Vec<u8> {
    let mut out = String::from("timestamp");
    for w in windows {
        out.push(',');
        out.push_str(&w.name);
    }
    out.push('\n');

    let rows = windows.iter().map(|w| w.values.len()).max().unwrap_or(0);
    // The longest channel provides the timestamp column.
    let clock = windows
        .iter()
        .max_by_key(|w| w.timestamps.len())
        .map(|w| w.timestamps.as_slice())
        .unwrap_or(&[]);

    for row in 0..rows {
        let ts_index = row + clock.len() - rows.min(clock.len());
        if let Some(ts) = clock.get(ts_index) {
            out.push_str(&ts.to_rfc3339());
        }
        for w in windows {
            out.push(',');
            let offset = rows - w.values.len();
            if row >= offset {
                out.push_str(&format!("{}", w.values[row - offset]));
            }
        }
        out.push('\n');
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ingest, StreamState};
    use crate::types::{Channel, Sample};

    fn populated_shared() -> PipelineShared {
        let config = StreamConfig::default();
        let channels = vec![Channel::new(0, "Fp1"), Channel::new(1, "Fp2")];
        let mut shared = PipelineShared::new(&config, channels).expect("valid defaults");
        shared.state = StreamState::Streaming;
        for i in 0..32_u64 {
            let t = i as f64 / 256.0;
            let v = (2.0 * std::f64::consts::PI * 10.0 * t).sin() * 20.0;
            ingest(&mut shared, &config, Sample::new(vec![v, -v], 256.0, i));
        }
        shared
    }

    #[test]
    fn test_csv_has_header_and_all_rows() {
        let shared = populated_shared();
        let config = StreamConfig::default();
        let bytes = export_window(
            &shared,
            &config,
            ExportFormat::Csv,
            &ExportSelection::default(),
        )
        .expect("csv export");
        let text = String::from_utf8(bytes).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("timestamp,Fp1,Fp2"));
        assert_eq!(lines.count(), 32);
    }

    #[test]
    fn test_json_reflects_stored_values_exactly() {
        let shared = populated_shared();
        let config = StreamConfig::default();
        let bytes = export_window(
            &shared,
            &config,
            ExportFormat::Json,
            &ExportSelection {
                channel_ids: vec![0],
                ..Default::default()
            },
        )
        .expect("json export");
        let doc: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");
        let values = doc["channels"][0]["values"].as_array().expect("values");
        let stored = shared.bank.latest(0, config.buffer_capacity_samples);
        assert_eq!(values.len(), stored.len());
        // Spot-check: export is the stored (filtered) data, not raw input.
        let first = values[0].as_f64().expect("f64");
        assert!((first - stored[0]).abs() < 1e-12);
    }

    #[test]
    fn test_time_range_trims_export() {
        let shared = populated_shared();
        let config = StreamConfig::default();
        let end = shared.last_timestamp.expect("data ingested");
        let start = end - ChronoDuration::milliseconds(20); // ~5 samples at 256 Hz
        let bytes = export_window(
            &shared,
            &config,
            ExportFormat::Json,
            &ExportSelection {
                channel_ids: vec![0],
                time_range: Some((start, end)),
            },
        )
        .expect("json export");
        let doc: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");
        let values = doc["channels"][0]["values"].as_array().expect("values");
        assert!(values.len() < 32);
        assert!(!values.is_empty());
    }

    #[test]
    fn test_empty_bank_exports_header_only_csv() {
        let config = StreamConfig::default();
        let shared =
            PipelineShared::new(&config, vec![Channel::new(0, "Fp1")]).expect("valid defaults");
        let bytes = export_window(
            &shared,
            &config,
            ExportFormat::Csv,
            &ExportSelection::default(),
        )
        .expect("csv export");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), "timestamp\n");
    }
}
