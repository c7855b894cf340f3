//! Timed calibration window.
//!
//! Samples observed during the first `duration` of a session, measured from
//! the first frame the window sees, are averaged into a baseline which is
//! frozen afterwards. A window that saw no samples
//! freezes at zero.

use log::{info, warn};
use std::ops::{Add, Div};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum State<T> {
    Collecting {
        sum: T,
        count: usize,
        started: Option<Duration>,
    },
    Frozen { baseline: T, samples: usize },
}

/// Accumulates samples until the window elapses, then freezes their mean
#[derive(Debug, Clone)]
pub struct CalibrationWindow<T> {
    name: &'static str,
    duration: Duration,
    state: State<T>,
}

impl<T> CalibrationWindow<T>
where
    T: Copy + Default + std::fmt::Debug + Add<Output = T> + Div<f64, Output = T>,
{
    /// Create a window named `name` (used in log output) lasting `duration`
    #[must_use]
    pub fn new(name: &'static str, duration: Duration) -> Self {
        Self {
            name,
            duration,
            state: State::Collecting {
                sum: T::default(),
                count: 0,
                started: None,
            },
        }
    }

    /// Feed the sample observed at `timestamp`.
    ///
    /// The first call starts the window. The sample is recorded first, then
    /// the window is closed if `timestamp` lies past its end. Returns the baseline on the call that
    /// freezes it.
    pub fn observe(&mut self, timestamp: Duration, sample: Option<T>) -> Option<T> {
        let State::Collecting { sum, count, started } = &mut self.state else {
            return None;
        };
        let start = *started.get_or_insert(timestamp);

        if let Some(sample) = sample {
            *sum = *sum + sample;
            *count += 1;
        }

        if timestamp.saturating_sub(start) <= self.duration {
            return None;
        }

        let samples = *count;
        let baseline = if samples == 0 {
            warn!("{} calibration saw no samples; baseline defaults to zero", self.name);
            T::default()
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = samples as f64;
            *sum / n
        };
        info!("{} calibration complete: {:?} from {} samples", self.name, baseline, samples);

        self.state = State::Frozen { baseline, samples };
        Some(baseline)
    }

    /// Advance the clock without a sample
    pub fn tick(&mut self, timestamp: Duration) -> Option<T> {
        self.observe(timestamp, None)
    }

    /// Frozen baseline, or zero while still calibrating
    #[must_use]
    pub fn baseline(&self) -> T {
        match self.state {
            State::Collecting { .. } => T::default(),
            State::Frozen { baseline, .. } => baseline,
        }
    }

    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        matches!(self.state, State::Frozen { .. })
    }

    /// Number of samples recorded so far
    #[must_use]
    pub fn samples(&self) -> usize {
        match self.state {
            State::Collecting { count, .. } => count,
            State::Frozen { samples, .. } => samples,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
