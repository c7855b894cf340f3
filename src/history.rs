//! Capped attention history and rolling averages.

use crate::ring_buffer::RingBuffer;
use log::debug;
use std::time::Duration;

/// One scored frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttentionSample {
    /// In [0, 1]
    pub value: f64,
    /// Session time of the frame
    pub timestamp: Duration,
}

/// A sample with the running total of every value pushed up to and including it
#[derive(Debug, Clone, Copy)]
struct Entry {
    sample: AttentionSample,
    cumulative: f64,
}

impl Entry {
    /// Running total just before this entry
    fn preceding(&self) -> f64 {
        self.cumulative - self.sample.value
    }
}

/// Session history of attention samples with FIFO eviction at the cap.
///
/// Each entry carries a running total, so window and session means are a
/// binary search plus one subtraction regardless of history length.
#[derive(Debug, Clone)]
pub struct AttentionHistory {
    entries: RingBuffer<Entry>,
}

impl AttentionHistory {
    /// # Panics
    ///
    /// Panics if capacity is 0
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RingBuffer::new(capacity),
        }
    }

    /// Append a sample. Timestamps are kept non-decreasing: a sample older
    /// than the newest one is stamped with the newest timestamp.
    pub fn push(&mut self, mut sample: AttentionSample) {
        let mut cumulative = sample.value;
        if let Some(latest) = self.entries.latest() {
            if sample.timestamp < latest.sample.timestamp {
                debug!(
                    "Out-of-order sample at {:.3}s after {:.3}s",
                    sample.timestamp.as_secs_f64(),
                    latest.sample.timestamp.as_secs_f64()
                );
                sample.timestamp = latest.sample.timestamp;
            }
            cumulative += latest.cumulative;
        }
        self.entries.push(Entry { sample, cumulative });
    }

    /// Mean of the samples with `now - window <= timestamp <= now`; 0 if none
    #[must_use]
    pub fn window_average(&self, window: Duration, now: Duration) -> f64 {
        let cutoff = now.saturating_sub(window);
        let start = self.entries.partition_point(|e| e.sample.timestamp < cutoff);
        let end = self.entries.partition_point(|e| e.sample.timestamp <= now);
        self.mean_of_range(start, end)
    }

    /// Mean over the whole retained session; 0 if empty
    #[must_use]
    pub fn session_average(&self) -> f64 {
        self.mean_of_range(0, self.entries.len())
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean_of_range(&self, start: usize, end: usize) -> f64 {
        if start >= end {
            return 0.0;
        }
        match (self.entries.get(start), self.entries.get(end - 1)) {
            (Some(first), Some(last)) => (last.cumulative - first.preceding()) / (end - start) as f64,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn latest(&self) -> Option<&AttentionSample> {
        self.entries.latest().map(|e| &e.sample)
    }

    /// Oldest retained sample
    #[must_use]
    pub fn oldest(&self) -> Option<&AttentionSample> {
        self.entries.get(0).map(|e| &e.sample)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttentionSample> {
        self.entries.iter().map(|e| &e.sample)
    }
}
