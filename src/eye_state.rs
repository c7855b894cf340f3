//! Eye openness from the eye aspect ratio (EAR).

use crate::{
    constants::{EPSILON, NUM_EAR_POINTS},
    landmarks::{EyePair, FaceLandmarks},
};
use nalgebra::{distance, Point2};

/// Openness of one eye
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EyeState {
    pub ear: f64,
    pub is_open: bool,
}

impl EyeState {
    pub const CLOSED: Self = Self {
        ear: 0.0,
        is_open: false,
    };
}

/// Eye aspect ratio over contour points p1..p6:
/// `(|p2-p6| + |p3-p5|) / (2 |p1-p4|)`. A collapsed eye width yields 0.
#[must_use]
pub fn eye_aspect_ratio(contour: &[Point2<f64>; NUM_EAR_POINTS]) -> f64 {
    let [p1, p2, p3, p4, p5, p6] = contour;
    let width = distance(p1, p4);
    if width < EPSILON {
        return 0.0;
    }
    (distance(p2, p6) + distance(p3, p5)) / (2.0 * width)
}

/// Thresholds the eye aspect ratio of each eye
#[derive(Debug, Clone)]
pub struct EyeStateClassifier {
    left_indices: [usize; NUM_EAR_POINTS],
    right_indices: [usize; NUM_EAR_POINTS],
    threshold: f64,
}

impl EyeStateClassifier {
    #[must_use]
    pub fn new(left_indices: [usize; NUM_EAR_POINTS], right_indices: [usize; NUM_EAR_POINTS], threshold: f64) -> Self {
        Self {
            left_indices,
            right_indices,
            threshold,
        }
    }

    /// Classify one eye contour
    #[must_use]
    pub fn classify_contour(&self, contour: &[Point2<f64>; NUM_EAR_POINTS]) -> EyeState {
        let ear = eye_aspect_ratio(contour);
        EyeState {
            ear,
            is_open: ear > self.threshold,
        }
    }

    /// Classify both eyes; an eye whose contour is missing from the set is closed
    #[must_use]
    pub fn classify(&self, landmarks: &FaceLandmarks) -> EyePair<EyeState> {
        EyePair::new(&self.left_indices, &self.right_indices).map(|indices| {
            landmarks
                .select(indices)
                .map_or(EyeState::CLOSED, |contour| self.classify_contour(&contour))
        })
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contour of width 2 and the given half-height
    fn contour(half_height: f64) -> [Point2<f64>; NUM_EAR_POINTS] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(0.5, -half_height),
            Point2::new(1.5, -half_height),
            Point2::new(2.0, 0.0),
            Point2::new(1.5, half_height),
            Point2::new(0.5, half_height),
        ]
    }

    #[test]
    fn test_eye_aspect_ratio() {
        // Vertical distances 2h each, width 2 => EAR = 4h / 4 = h
        assert!((eye_aspect_ratio(&contour(0.3)) - 0.3).abs() < 1e-12);
        assert_eq!(eye_aspect_ratio(&contour(0.0)), 0.0);
    }

    #[test]
    fn test_zero_width_eye() {
        assert_eq!(eye_aspect_ratio(&[Point2::new(1.0, 1.0); NUM_EAR_POINTS]), 0.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let classifier = EyeStateClassifier::new([0, 1, 2, 3, 4, 5], [6, 7, 8, 9, 10, 11], 0.18);
        assert!(classifier.classify_contour(&contour(0.25)).is_open);
        assert!(!classifier.classify_contour(&contour(0.05)).is_open);

        let at_threshold = contour(0.2);
        let classifier = EyeStateClassifier::new([0; 6], [0; 6], eye_aspect_ratio(&at_threshold));
        assert!(!classifier.classify_contour(&at_threshold).is_open);
    }

    #[test]
    fn test_classify_both_eyes() {
        let classifier = EyeStateClassifier::new([0, 1, 2, 3, 4, 5], [6, 7, 8, 9, 10, 11], 0.18);
        let points: Vec<_> = contour(0.3).into_iter().chain(contour(0.1)).collect();
        let states = classifier.classify(&FaceLandmarks::new(points.clone()));
        assert!(states.left.is_open);
        assert!(!states.right.is_open);

        // Right contour missing
        let states = classifier.classify(&FaceLandmarks::new(points[..6].to_vec()));
        assert!(states.left.is_open);
        assert_eq!(states.right, EyeState::CLOSED);
    }
}
