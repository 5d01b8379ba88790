//! Bounded per-channel history buffers.
//!
//! One fixed-capacity ring per active channel, keyed by stable channel id.
//! Capacity is fixed at construction; a configuration change that alters the
//! window size reconstructs the bank rather than resizing in place, which
//! would risk partial-history corruption.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

use crate::types::ChannelId;

// ============================================================================
// Ring buffer
// ============================================================================

/// Fixed-capacity ring holding the most recent values for one channel.
///
/// `push` is O(1) and never fails; when full, the oldest value is evicted.
/// Capacity is a `NonZeroUsize` so a zero-capacity buffer is unrepresentable
/// (fail fast at construction, not at first use).
#[derive(Debug, Clone)]
pub struct RingBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.get()),
            capacity: capacity.get(),
        }
    }

    /// Append one value, evicting the oldest when at capacity.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// The `min(count, len)` most recent values in arrival order, oldest
    /// first. Never mutates the buffer.
    pub fn latest(&self, count: usize) -> Vec<f64> {
        let take = count.min(self.values.len());
        let skip = self.values.len() - take;
        self.values.iter().skip(skip).copied().collect()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill ratio in [0,1].
    pub fn fill_ratio(&self) -> f64 {
        self.values.len() as f64 / self.capacity as f64
    }
}

// ============================================================================
// Channel bank
// ============================================================================

/// All per-channel ring buffers, keyed by channel id.
///
/// Buffers are created lazily on a channel's first write and retained when
/// the channel is deactivated, so re-enabling a channel resumes with its
/// prior history intact. Only [`clear_all`](ChannelBank::clear_all) (or
/// reconstruction after a capacity change) discards history.
#[derive(Debug, Clone)]
pub struct ChannelBank {
    buffers: BTreeMap<ChannelId, RingBuffer>,
    capacity: NonZeroUsize,
}

impl ChannelBank {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffers: BTreeMap::new(),
            capacity,
        }
    }

    /// Append one filtered value for `channel`, creating its ring lazily.
    pub fn push(&mut self, channel: ChannelId, value: f64) {
        self.buffers
            .entry(channel)
            .or_insert_with(|| RingBuffer::new(self.capacity))
            .push(value);
    }

    /// Latest `count` values for `channel`, oldest first.
    ///
    /// An id with no buffer yet (never activated, or toggled off before any
    /// data arrived) returns an empty vec rather than erroring — channels
    /// can be toggled at runtime and readers must tolerate that.
    pub fn latest(&self, channel: ChannelId, count: usize) -> Vec<f64> {
        self.buffers
            .get(&channel)
            .map(|ring| ring.latest(count))
            .unwrap_or_default()
    }

    /// Reset one channel's ring to empty (no-op for unknown ids).
    pub fn clear(&mut self, channel: ChannelId) {
        if let Some(ring) = self.buffers.get_mut(&channel) {
            ring.clear();
        }
    }

    /// Reset every ring.
    pub fn clear_all(&mut self) {
        for ring in self.buffers.values_mut() {
            ring.clear();
        }
    }

    /// Number of buffered values for `channel` (0 for unknown ids).
    pub fn len(&self, channel: ChannelId) -> usize {
        self.buffers.get(&channel).map_or(0, RingBuffer::len)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Fill ratio of the fullest ring, 0.0 when no channel has data.
    pub fn max_fill_ratio(&self) -> f64 {
        self.buffers
            .values()
            .map(RingBuffer::fill_ratio)
            .fold(0.0, f64::max)
    }

    /// Ids that currently have a ring (in key order).
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.buffers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).expect("test capacity")
    }

    #[test]
    fn test_overwrites_oldest_in_arrival_order() {
        // N pushes into capacity C (N > C): latest(C) is exactly the last C
        // pushed values in arrival order.
        let mut ring = RingBuffer::new(cap(5));
        for i in 0..12 {
            ring.push(f64::from(i));
        }
        assert_eq!(ring.latest(5), vec![7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(ring.len(), 5);
    }

    #[test]
    fn test_latest_clamps_to_available() {
        let mut ring = RingBuffer::new(cap(10));
        ring.push(1.0);
        ring.push(2.0);
        assert_eq!(ring.latest(100), vec![1.0, 2.0]);
        assert_eq!(ring.latest(1), vec![2.0]);
        assert!(ring.latest(0).is_empty());
    }

    #[test]
    fn test_latest_does_not_mutate() {
        let mut ring = RingBuffer::new(cap(3));
        ring.push(1.0);
        let _ = ring.latest(3);
        let _ = ring.latest(3);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_unknown_channel_reads_empty() {
        let bank = ChannelBank::new(cap(8));
        assert!(bank.latest(99, 4).is_empty());
        assert_eq!(bank.len(99), 0);
    }

    #[test]
    fn test_clear_single_channel_leaves_others() {
        let mut bank = ChannelBank::new(cap(4));
        bank.push(0, 1.0);
        bank.push(1, 2.0);
        bank.clear(0);
        assert!(bank.latest(0, 4).is_empty());
        assert_eq!(bank.latest(1, 4), vec![2.0]);
    }

    #[test]
    fn test_fill_ratio_tracks_fullest_channel() {
        let mut bank = ChannelBank::new(cap(4));
        bank.push(0, 1.0);
        bank.push(1, 1.0);
        bank.push(1, 2.0);
        assert!((bank.max_fill_ratio() - 0.5).abs() < 1e-12);
    }
}
