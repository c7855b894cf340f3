//! Head mobility tracking.
//!
//! Keeps the most recent landmark sets and measures how far the face moved
//! between the last two of them. Low movement reads as high stability,
//! which the scorer treats as a sign of focus.

use crate::{landmarks::FaceLandmarks, ring_buffer::RingBuffer};
use log::warn;
use nalgebra::distance;

/// Movement between the two most recent frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobilityReading {
    /// Mean per-landmark displacement in pixels
    pub mobility: f64,
    /// `1 - clamp(mobility / full_scale, 0, 1)`
    pub stability: f64,
}

/// Map raw mobility to a stability score in [0, 1]. Non-finite mobility
/// counts as full movement.
#[must_use]
pub fn stability_score(mobility: f64, full_scale_px: f64) -> f64 {
    if !mobility.is_finite() {
        return 0.0;
    }
    1.0 - (mobility / full_scale_px).clamp(0.0, 1.0)
}

/// Mean Euclidean displacement between corresponding landmarks
#[must_use]
pub fn mean_displacement(previous: &FaceLandmarks, current: &FaceLandmarks) -> f64 {
    let n = previous.len().min(current.len());
    if n == 0 {
        return 0.0;
    }
    let total: f64 = previous
        .points()
        .iter()
        .zip(current.points())
        .map(|(a, b)| distance(a, b))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let n = n as f64;
    total / n
}

/// Tracks landmark history and derives a stability score per frame
pub struct HeadMobilityTracker {
    full_scale_px: f64,
    history: RingBuffer<FaceLandmarks>,
    mobility_history: RingBuffer<f64>,
}

impl HeadMobilityTracker {
    /// Create a tracker keeping `capacity` frames; `full_scale_px` of mean
    /// displacement maps to zero stability
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0
    #[must_use]
    pub fn new(capacity: usize, full_scale_px: f64) -> Self {
        Self {
            full_scale_px,
            history: RingBuffer::new(capacity),
            mobility_history: RingBuffer::new(capacity),
        }
    }

    /// Record this frame's landmarks and measure movement since the previous frame
    pub fn update(&mut self, landmarks: &FaceLandmarks) -> MobilityReading {
        if let Some(latest) = self.history.latest() {
            if latest.len() != landmarks.len() {
                warn!(
                    "Landmark count changed from {} to {}; restarting mobility history",
                    latest.len(),
                    landmarks.len()
                );
                self.history.clear();
            }
        }
        self.history.push(landmarks.clone());

        let mobility = match self.history.last_two() {
            Some((previous, current)) => {
                let mobility = mean_displacement(previous, current);
                self.mobility_history.push(mobility);
                mobility
            }
            None => 0.0,
        };

        MobilityReading {
            mobility,
            stability: stability_score(mobility, self.full_scale_px),
        }
    }

    /// Statistics over the recent mobility samples
    #[must_use]
    pub fn stats(&self) -> Option<Statistics> {
        if self.mobility_history.is_empty() {
            return None;
        }
        Some(Self::calculate_stats(&self.mobility_history))
    }

    /// Number of landmark sets currently held
    #[must_use]
    pub fn frames(&self) -> usize {
        self.history.len()
    }

    /// Reset the tracker
    pub fn reset(&mut self) {
        self.history.clear();
        self.mobility_history.clear();
    }

    /// Calculate statistics for a data window
    #[allow(clippy::cast_precision_loss)]
    fn calculate_stats(data: &RingBuffer<f64>) -> Statistics {
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;

        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let std_dev = variance.sqrt();

        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Statistics { mean, std_dev, min, max }
    }
}

/// Statistical summary of recent mobility samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Mean value of the data
    pub mean: f64,
    /// Standard deviation of the data
    pub std_dev: f64,
    /// Minimum value in the window
    pub min: f64,
    /// Maximum value in the window
    pub max: f64,
}
