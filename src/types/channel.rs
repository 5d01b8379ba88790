//! Channel identity and display metadata.

use serde::{Deserialize, Serialize};

use super::sample::ChannelId;

/// Spatial placement of a channel, used only for layout and coloring.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelPosition {
    pub x: f64,
    pub y: f64,
}

/// One configured signal channel.
///
/// Immutable once configured; mutated only through explicit configuration
/// updates (enable/disable, gain change) on the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub position: ChannelPosition,
    /// Per-channel gain applied before filtering.
    pub gain: f64,
    pub active: bool,
    /// Display color as a hex string (e.g. "#4fc3f7").
    pub color: String,
}

impl Channel {
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: ChannelPosition::default(),
            gain: 1.0,
            active: true,
            color: default_color(id),
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = ChannelPosition { x, y };
        self
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }
}

/// Deterministic per-id color from a small rotating palette.
fn default_color(id: ChannelId) -> String {
    const PALETTE: [&str; 8] = [
        "#4fc3f7", "#81c784", "#ffb74d", "#e57373", "#ba68c8", "#4db6ac", "#fff176", "#90a4ae",
    ];
    PALETTE[(id as usize) % PALETTE.len()].to_string()
}
