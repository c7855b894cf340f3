//! Gaze calibration, smoothing and the attention-cone test.
//!
//! Raw per-eye gaze vectors come from an external estimator. During the
//! calibration window their mean is learned as a per-eye offset; after
//! that each vector is offset-corrected, biased upwards by a constant
//! pitch, smoothed over time and scored against the screen cone.

use crate::{
    calibration::CalibrationWindow,
    filters::{create_filter, AngleFilter},
    landmarks::EyePair,
    Error, Result,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Sub};
use std::time::Duration;

/// Eye-ball direction relative to the camera axis, in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazeVector {
    pub yaw: f64,
    pub pitch: f64,
}

impl GazeVector {
    #[must_use]
    pub fn new(yaw: f64, pitch: f64) -> Self {
        Self { yaw, pitch }
    }

    /// Build from angles in degrees
    #[must_use]
    pub fn from_degrees(yaw: f64, pitch: f64) -> Self {
        Self::new(yaw.to_radians(), pitch.to_radians())
    }

    /// `(yaw, pitch)` in degrees
    #[must_use]
    pub fn to_degrees(self) -> (f64, f64) {
        (self.yaw.to_degrees(), self.pitch.to_degrees())
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite()
    }
}

impl Add for GazeVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.yaw + rhs.yaw, self.pitch + rhs.pitch)
    }
}

impl Sub for GazeVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.yaw - rhs.yaw, self.pitch - rhs.pitch)
    }
}

impl Div<f64> for GazeVector {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self::new(self.yaw / rhs, self.pitch / rhs)
    }
}

/// Half-widths of the screen cone, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeCone {
    pub horizontal_deg: f64,
    pub vertical_deg: f64,
}

impl GazeCone {
    /// Score a smoothed gaze vector: 1 inside the cone, otherwise a linear
    /// falloff `max(0, 1 - (|yaw|/h + |pitch|/v) / 2)`.
    #[must_use]
    pub fn score(&self, gaze: GazeVector) -> EyeGaze {
        let (yaw_deg, pitch_deg) = gaze.to_degrees();
        let in_screen = yaw_deg.abs() < self.horizontal_deg && pitch_deg.abs() < self.vertical_deg;
        let score = if in_screen {
            1.0
        } else {
            let falloff = (yaw_deg.abs() / self.horizontal_deg + pitch_deg.abs() / self.vertical_deg) / 2.0;
            // NaN compares false and falls to zero
            if falloff < 1.0 {
                1.0 - falloff
            } else {
                0.0
            }
        };

        EyeGaze {
            in_screen,
            score,
            smoothed: gaze,
        }
    }
}

/// Per-eye gaze result for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeGaze {
    pub in_screen: bool,
    /// In [0, 1]
    pub score: f64,
    /// Smoothed, corrected gaze the score was computed from
    pub smoothed: GazeVector,
}

impl EyeGaze {
    /// Score of an eye without gaze, zero when unavailable
    #[must_use]
    pub fn score_or_zero(gaze: Option<&Self>) -> f64 {
        gaze.map_or(0.0, |g| g.score)
    }
}

/// Gaze calibrator settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeSettings {
    pub cone: GazeCone,
    /// Pitch added after offset correction, in radians
    pub vertical_offset: f64,
    /// Weight of the previous smoothed value
    pub smoothing: f64,
    pub calibration: Duration,
}

/// Learns per-eye gaze offsets and turns raw gaze into cone scores
pub struct GazeCalibrator {
    settings: GazeSettings,
    offsets: EyePair<CalibrationWindow<GazeVector>>,
    filters: EyePair<Box<dyn AngleFilter>>,
}

impl GazeCalibrator {
    /// # Errors
    ///
    /// Returns an error if the cone is not positive or smoothing is outside [0, 1)
    pub fn new(settings: GazeSettings) -> Result<Self> {
        if settings.cone.horizontal_deg <= 0.0 || settings.cone.vertical_deg <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Gaze tolerances must be positive, got {:?}",
                settings.cone
            )));
        }

        Ok(Self {
            offsets: EyePair::new(
                CalibrationWindow::new("Left gaze", settings.calibration),
                CalibrationWindow::new("Right gaze", settings.calibration),
            ),
            filters: EyePair::new(create_filter(settings.smoothing)?, create_filter(settings.smoothing)?),
            settings,
        })
    }

    /// Process the raw gaze vectors observed at session time `timestamp`.
    /// An eye without gaze yields `None` and keeps its smoothing state.
    pub fn update(&mut self, raw: EyePair<Option<GazeVector>>, timestamp: Duration) -> EyePair<Option<EyeGaze>> {
        let settings = self.settings;
        let raw = raw.map(|gaze| gaze.filter(GazeVector::is_finite));

        self.offsets
            .as_mut()
            .zip(self.filters.as_mut())
            .zip(raw)
            .map(|((offset, filter), raw)| {
                if offset.observe(timestamp, raw).is_some() {
                    // Offset changes under the filter; start it fresh
                    filter.reset();
                }
                let raw = raw?;

                let mut corrected = raw - offset.baseline();
                corrected.pitch += settings.vertical_offset;
                let (yaw, pitch) = filter.apply(corrected.yaw, corrected.pitch);

                Some(settings.cone.score(GazeVector::new(yaw, pitch)))
            })
    }

    /// Advance the calibration clock on a frame without a face
    pub fn tick(&mut self, timestamp: Duration) {
        for (offset, filter) in [
            (&mut self.offsets.left, &mut self.filters.left),
            (&mut self.offsets.right, &mut self.filters.right),
        ] {
            if offset.tick(timestamp).is_some() {
                filter.reset();
            }
        }
        debug!("Gaze unavailable at {:.3}s", timestamp.as_secs_f64());
    }

    /// Learned offsets, zero while calibrating
    #[must_use]
    pub fn offsets(&self) -> EyePair<GazeVector> {
        EyePair::new(self.offsets.left.baseline(), self.offsets.right.baseline())
    }

    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.offsets.left.is_calibrated() && self.offsets.right.is_calibrated()
    }
}
