//! Per-frame fusion of head, eye, gaze and mobility signals.

use crate::{
    config::Config,
    constants::{
        DEFAULT_EYES_WEIGHT, DEFAULT_GAZE_WEIGHT, DEFAULT_HEAD_WEIGHT, DEFAULT_MOBILITY_WEIGHT, WEIGHT_SUM_EPSILON,
    },
    eye_state::{EyeState, EyeStateClassifier},
    gaze::{EyeGaze, GazeCalibrator},
    history::AttentionSample,
    landmarks::{EyePair, LandmarkLayout},
    mobility::{HeadMobilityTracker, MobilityReading},
    pipeline::FrameInput,
    pose_estimation::{HeadAssessment, HeadPoseEstimator},
    query::{AttentionQueryService, PublishedFrame, SharedBoard},
    Error, Result,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relative contribution of each signal to the attention score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub head: f64,
    pub eyes: f64,
    pub gaze: f64,
    pub mobility: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            head: DEFAULT_HEAD_WEIGHT,
            eyes: DEFAULT_EYES_WEIGHT,
            gaze: DEFAULT_GAZE_WEIGHT,
            mobility: DEFAULT_MOBILITY_WEIGHT,
        }
    }
}

impl FusionWeights {
    /// Check that every weight is in [0, 1] and that they sum to 1
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` otherwise
    pub fn validate(&self) -> Result<()> {
        let weights = [self.head, self.eyes, self.gaze, self.mobility];
        if weights.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(Error::ConfigError(format!(
                "Fusion weights must be in [0, 1], got {self:?}"
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(Error::ConfigError(format!("Fusion weights must sum to 1.0, got {sum}")));
        }
        Ok(())
    }

    /// Weighted sum of the per-signal scores
    #[must_use]
    pub fn fuse(&self, signals: &FrameSignals) -> f64 {
        let head = if signals.head_ok { 1.0 } else { 0.0 };
        let eyes = 0.5 * open_score(signals.eyes_open.left) + 0.5 * open_score(signals.eyes_open.right);
        let gaze = 0.5 * signals.gaze_scores.left + 0.5 * signals.gaze_scores.right;

        let attention =
            self.head * head + self.eyes * eyes + self.gaze * gaze + self.mobility * signals.stability;
        attention.clamp(0.0, 1.0)
    }
}

fn open_score(open: bool) -> f64 {
    if open {
        1.0
    } else {
        0.0
    }
}

/// Signal values feeding one fusion
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSignals {
    pub head_ok: bool,
    pub eyes_open: EyePair<bool>,
    /// Each in [0, 1]
    pub gaze_scores: EyePair<f64>,
    /// In [0, 1]
    pub stability: f64,
}

/// Everything computed for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameScore {
    pub timestamp: Duration,
    /// Fused score in [0, 1]
    pub attention: f64,
    /// `None` when no usable face was present
    pub head: Option<HeadAssessment>,
    pub eyes: EyePair<EyeState>,
    pub gaze: EyePair<Option<EyeGaze>>,
    pub mobility: Option<MobilityReading>,
}

impl FrameScore {
    /// Zero-attention result for a frame without a face
    #[must_use]
    pub fn no_face(timestamp: Duration) -> Self {
        Self {
            timestamp,
            attention: 0.0,
            head: None,
            eyes: EyePair::new(EyeState::CLOSED, EyeState::CLOSED),
            gaze: EyePair::default(),
            mobility: None,
        }
    }

    #[must_use]
    pub fn face_detected(&self) -> bool {
        self.head.is_some()
    }

    #[must_use]
    pub fn head_ok(&self) -> bool {
        self.head.is_some_and(|h| h.head_ok)
    }

    #[must_use]
    pub fn gaze_scores(&self) -> EyePair<f64> {
        self.gaze.as_ref().map(|g| EyeGaze::score_or_zero(g.as_ref()))
    }

    fn published(&self) -> PublishedFrame {
        PublishedFrame {
            attention: self.attention,
            head_ok: self.head_ok(),
            eyes_open: self.eyes.map(|e| e.is_open),
            gaze_scores: self.gaze_scores(),
            timestamp: self.timestamp,
        }
    }
}

/// Owns every per-frame stage and publishes results to the shared board
pub struct AttentionScorer {
    head: HeadPoseEstimator,
    eyes: EyeStateClassifier,
    gaze: GazeCalibrator,
    mobility: HeadMobilityTracker,
    weights: FusionWeights,
    layout: LandmarkLayout,
    board: SharedBoard,
    layout_warned: bool,
}

impl AttentionScorer {
    /// Build every stage from a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let layout = config.landmarks.clone();
        let calibration = config.calibration_duration();
        info!(
            "Initializing AttentionScorer: weights {:?}, {} landmarks required",
            config.weights,
            layout.required_landmarks()
        );

        Ok(Self {
            head: HeadPoseEstimator::new(
                layout.pose,
                config.head_tolerances(),
                config.head_pose.max_reprojection_error_px,
                calibration,
            )?,
            eyes: EyeStateClassifier::new(layout.left_eye, layout.right_eye, config.eyes.ear_threshold),
            gaze: GazeCalibrator::new(config.gaze_settings())?,
            mobility: HeadMobilityTracker::new(config.mobility.history_capacity, config.mobility.full_scale_px),
            weights: config.weights,
            board: SharedBoard::new(config.history.session_capacity, config.horizons()),
            layout,
            layout_warned: false,
        })
    }

    /// Run every stage on one frame without publishing the result
    pub fn score_frame(&mut self, frame: &FrameInput) -> FrameScore {
        let timestamp = frame.timestamp;

        let landmarks = match &frame.landmarks {
            Some(landmarks) if self.layout.fits(landmarks) => landmarks,
            Some(landmarks) => {
                if !self.layout_warned {
                    warn!(
                        "Landmark set has {} points, layout needs {}; treating as no face",
                        landmarks.len(),
                        self.layout.required_landmarks()
                    );
                    self.layout_warned = true;
                }
                return self.no_face(timestamp);
            }
            None => return self.no_face(timestamp),
        };

        let head = self.head.update(landmarks, frame.frame_width, frame.frame_height, timestamp);
        let eyes = self.eyes.classify(landmarks);
        let gaze = self.gaze.update(frame.gaze, timestamp);
        let mobility = self.mobility.update(landmarks);

        let score = FrameScore {
            timestamp,
            attention: 0.0,
            head: Some(head),
            eyes,
            gaze,
            mobility: Some(mobility),
        };
        let signals = FrameSignals {
            head_ok: head.head_ok,
            eyes_open: eyes.map(|e| e.is_open),
            gaze_scores: score.gaze_scores(),
            stability: mobility.stability,
        };
        let attention = self.weights.fuse(&signals);
        debug!(
            "Frame {:.3}s: attention {attention:.3} ({signals:?})",
            timestamp.as_secs_f64()
        );

        FrameScore { attention, ..score }
    }

    fn no_face(&mut self, timestamp: Duration) -> FrameScore {
        self.head.tick(timestamp);
        self.gaze.tick(timestamp);
        debug!("No face at {:.3}s", timestamp.as_secs_f64());
        FrameScore::no_face(timestamp)
    }

    /// Make a scored frame visible to readers, atomically with its history sample
    pub fn publish(&self, score: &FrameScore) {
        let sample = AttentionSample {
            value: score.attention,
            timestamp: score.timestamp,
        };
        self.board.record(score.published(), sample);
    }

    /// Score and publish one frame
    pub fn process(&mut self, frame: &FrameInput) -> FrameScore {
        let score = self.score_frame(frame);
        self.publish(&score);
        score
    }

    /// Read handle over the published state
    #[must_use]
    pub fn query_service(&self) -> AttentionQueryService {
        AttentionQueryService::new(self.board.clone())
    }

    #[must_use]
    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Whether head and gaze baselines are frozen
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.head.is_calibrated() && self.gaze.is_calibrated()
    }

    #[must_use]
    pub fn head_estimator(&self) -> &HeadPoseEstimator {
        &self.head
    }

    #[must_use]
    pub fn gaze_calibrator(&self) -> &GazeCalibrator {
        &self.gaze
    }

    #[must_use]
    pub fn mobility_tracker(&self) -> &HeadMobilityTracker {
        &self.mobility
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::FaceLandmarks;

    fn signals(head_ok: bool, eyes: bool, gaze: f64, stability: f64) -> FrameSignals {
        FrameSignals {
            head_ok,
            eyes_open: EyePair::new(eyes, eyes),
            gaze_scores: EyePair::new(gaze, gaze),
            stability,
        }
    }

    #[test]
    fn test_all_nominal_is_full_attention() {
        let weights = FusionWeights::default();
        assert!((weights.fuse(&signals(true, true, 1.0, 1.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_failed_is_zero() {
        let weights = FusionWeights::default();
        assert_eq!(weights.fuse(&signals(false, false, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_head_only_failure() {
        let weights = FusionWeights::default();
        assert!((weights.fuse(&signals(false, true, 1.0, 1.0)) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_one_eye_open() {
        let weights = FusionWeights::default();
        let mut s = signals(true, true, 1.0, 1.0);
        s.eyes_open.right = false;
        s.gaze_scores.right = 0.5;
        // 0.2 + 0.2 * 0.5 + 0.4 * 0.75 + 0.2
        assert!((weights.fuse(&s) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_weight_validation() {
        assert!(FusionWeights::default().validate().is_ok());

        let skewed = FusionWeights {
            head: 0.5,
            ..FusionWeights::default()
        };
        assert!(skewed.validate().is_err());

        let negative = FusionWeights {
            head: -0.2,
            eyes: 0.4,
            gaze: 0.6,
            mobility: 0.2,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_small_landmark_set_counts_as_no_face() {
        let mut scorer = AttentionScorer::new(&Config::default()).unwrap();
        let frame = FrameInput {
            timestamp: Duration::from_millis(100),
            frame_width: 640,
            frame_height: 480,
            landmarks: Some(FaceLandmarks::from_pairs(&[[1.0, 2.0]; 68])),
            gaze: EyePair::default(),
        };
        let score = scorer.process(&frame);
        assert!(!score.face_detected());
        assert_eq!(score.attention, 0.0);
        assert_eq!(scorer.query_service().snapshot().frames, 1);
    }

    #[test]
    fn test_no_face_advances_calibration() {
        let mut scorer = AttentionScorer::new(&Config::default()).unwrap();
        for i in 0..=12 {
            scorer.process(&FrameInput::no_face(Duration::from_millis(500 * i), 640, 480));
        }
        assert!(scorer.is_calibrated());
        assert_eq!(scorer.head_estimator().pitch_baseline(), 0.0);
    }
}
