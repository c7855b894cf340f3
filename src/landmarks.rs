//! Landmark containers shared by the per-frame stages.

use crate::constants::{
    MEDIAPIPE_LEFT_EYE_INDICES, MEDIAPIPE_POSE_INDICES, MEDIAPIPE_RIGHT_EYE_INDICES, NUM_EAR_POINTS, NUM_POSE_POINTS,
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Dense 2D facial landmarks for one tracked face, in pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<Point2<f64>>,
}

impl FaceLandmarks {
    /// Wrap an ordered landmark set
    #[must_use]
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Build from raw `[x, y]` pairs
    #[must_use]
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Self {
        Self::new(pairs.iter().map(|&[x, y]| Point2::new(x, y)).collect())
    }

    /// Number of landmarks
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All landmarks in model order
    #[must_use]
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Gather a fixed subset of landmarks, or `None` if any index is out of range
    #[must_use]
    pub fn select<const N: usize>(&self, indices: &[usize; N]) -> Option<[Point2<f64>; N]> {
        let mut out = [Point2::origin(); N];
        for (slot, &idx) in out.iter_mut().zip(indices) {
            *slot = *self.points.get(idx)?;
        }
        Some(out)
    }
}

/// A value per eye. "Left" is the subject's left eye.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyePair<T> {
    pub left: T,
    pub right: T,
}

impl<T> EyePair<T> {
    #[must_use]
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    /// Apply `f` to both eyes
    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> EyePair<U> {
        EyePair {
            left: f(self.left),
            right: f(self.right),
        }
    }

    pub fn as_ref(&self) -> EyePair<&T> {
        EyePair {
            left: &self.left,
            right: &self.right,
        }
    }

    pub fn as_mut(&mut self) -> EyePair<&mut T> {
        EyePair {
            left: &mut self.left,
            right: &mut self.right,
        }
    }

    /// Combine two pairs eye by eye
    pub fn zip<U>(self, other: EyePair<U>) -> EyePair<(T, U)> {
        EyePair {
            left: (self.left, other.left),
            right: (self.right, other.right),
        }
    }
}

/// Which landmark indices feed the pose solve and the eye aspect ratios
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkLayout {
    /// Nose tip, chin, left eye outer corner, right eye outer corner,
    /// left mouth corner, right mouth corner
    pub pose: [usize; NUM_POSE_POINTS],

    /// Left eye contour p1..p6
    pub left_eye: [usize; NUM_EAR_POINTS],

    /// Right eye contour p1..p6
    pub right_eye: [usize; NUM_EAR_POINTS],
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self {
            pose: MEDIAPIPE_POSE_INDICES,
            left_eye: MEDIAPIPE_LEFT_EYE_INDICES,
            right_eye: MEDIAPIPE_RIGHT_EYE_INDICES,
        }
    }
}

impl LandmarkLayout {
    /// Smallest landmark count that satisfies every index in the layout
    #[must_use]
    pub fn required_landmarks(&self) -> usize {
        self.pose
            .iter()
            .chain(&self.left_eye)
            .chain(&self.right_eye)
            .max()
            .map_or(0, |&max| max + 1)
    }

    /// Whether a landmark set is large enough for this layout
    #[must_use]
    pub fn fits(&self, landmarks: &FaceLandmarks) -> bool {
        landmarks.len() >= self.required_landmarks()
    }
}
