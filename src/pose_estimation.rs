use crate::{
    calibration::CalibrationWindow,
    constants::{CAMERA_CENTER_FACTOR, EPSILON, FACE_MODEL_POINTS, GIMBAL_EPSILON, NUM_POSE_POINTS},
    landmarks::FaceLandmarks,
    Error, Result,
};
use log::debug;
use nalgebra::{DMatrix, Matrix3, Point2, Rotation3, SMatrix, SVector, Vector2, Vector3, Vector6};
use std::time::Duration;

const MAX_LM_ITERATIONS: usize = 100;
const MAX_DAMPING_RETRIES: usize = 10;
const INITIAL_DAMPING: f64 = 1e-3;
const MIN_IMAGE_SPREAD_PX: f64 = 1.0;

type Residuals = SVector<f64, { 2 * NUM_POSE_POINTS }>;
type Jacobian = SMatrix<f64, { 2 * NUM_POSE_POINTS }, 6>;

/// Pinhole camera derived from frame dimensions, without lens distortion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub focal_length: f64,
    pub center: Vector2<f64>,
}

impl CameraIntrinsics {
    /// Focal length equals the frame width, principal point is the frame center
    #[must_use]
    pub fn from_frame_size(width: u32, height: u32) -> Self {
        let width = f64::from(width);
        let height = f64::from(height);
        Self {
            focal_length: width,
            center: Vector2::new(width / CAMERA_CENTER_FACTOR, height / CAMERA_CENTER_FACTOR),
        }
    }

    /// Project a camera-space point to pixels, or `None` if it lies behind the camera
    #[must_use]
    pub fn project(&self, point: &Vector3<f64>) -> Option<Point2<f64>> {
        if point.z <= EPSILON {
            return None;
        }
        Some(Point2::new(
            self.focal_length * point.x / point.z + self.center.x,
            self.focal_length * point.y / point.z + self.center.y,
        ))
    }

    fn normalize(&self, pixel: &Point2<f64>) -> Vector2<f64> {
        (pixel.coords - self.center) / self.focal_length
    }
}

/// Rotation and translation mapping model coordinates into camera space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSolution {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    /// Root mean square reprojection error in pixels
    pub reprojection_error: f64,
}

/// Euler angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Outcome of the per-frame pose computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadPose {
    Solved { yaw: f64, pitch: f64, roll: f64 },
    /// The solve did not converge; head alignment is unknown
    Unsolved,
}

impl HeadPose {
    #[must_use]
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved { .. })
    }

    /// Angles of a solved pose
    #[must_use]
    pub fn angles(&self) -> Option<EulerAngles> {
        match *self {
            Self::Solved { yaw, pitch, roll } => Some(EulerAngles { yaw, pitch, roll }),
            Self::Unsolved => None,
        }
    }
}

impl From<EulerAngles> for HeadPose {
    fn from(angles: EulerAngles) -> Self {
        Self::Solved {
            yaw: angles.yaw,
            pitch: angles.pitch,
            roll: angles.roll,
        }
    }
}

/// Angular window in which the head counts as facing the screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadTolerances {
    pub yaw_deg: f64,
    pub pitch_up_deg: f64,
    pub pitch_down_deg: f64,
}

/// Pose and screen alignment for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadAssessment {
    pub pose: HeadPose,
    pub head_ok: bool,
}

/// Head pose estimator using a perspective-n-point solve against a fixed face model
pub struct HeadPoseEstimator {
    model_points: [Vector3<f64>; NUM_POSE_POINTS],
    landmark_indices: [usize; NUM_POSE_POINTS],
    tolerances: HeadTolerances,
    max_reprojection_error: f64,
    pitch_calibration: CalibrationWindow<f64>,
}

impl HeadPoseEstimator {
    /// Create an estimator reading the six pose landmarks at `landmark_indices`
    ///
    /// # Errors
    ///
    /// Returns an error if a tolerance or the reprojection limit is not positive
    pub fn new(
        landmark_indices: [usize; NUM_POSE_POINTS],
        tolerances: HeadTolerances,
        max_reprojection_error: f64,
        calibration: Duration,
    ) -> Result<Self> {
        if tolerances.yaw_deg <= 0.0 || tolerances.pitch_up_deg <= 0.0 || tolerances.pitch_down_deg <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Head tolerances must be positive, got {tolerances:?}"
            )));
        }
        if max_reprojection_error.is_nan() || max_reprojection_error <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Reprojection error limit must be positive, got {max_reprojection_error}"
            )));
        }
        log::info!(
            "Initializing HeadPoseEstimator: yaw ±{}°, pitch +{}°/-{}°, {:.1}s calibration",
            tolerances.yaw_deg,
            tolerances.pitch_up_deg,
            tolerances.pitch_down_deg,
            calibration.as_secs_f64()
        );

        Ok(Self {
            model_points: FACE_MODEL_POINTS.map(|[x, y, z]| Vector3::new(x, y, z)),
            landmark_indices,
            tolerances,
            max_reprojection_error,
            pitch_calibration: CalibrationWindow::new("Pitch", calibration),
        })
    }

    /// Compute the head pose without touching calibration state
    #[must_use]
    pub fn estimate(&self, landmarks: &FaceLandmarks, frame_width: u32, frame_height: u32) -> HeadPose {
        let Some(image_points) = landmarks.select(&self.landmark_indices) else {
            debug!("Landmark set too small for pose solve ({} points)", landmarks.len());
            return HeadPose::Unsolved;
        };
        let camera = CameraIntrinsics::from_frame_size(frame_width, frame_height);

        match solve_pnp(&self.model_points, &image_points, &camera) {
            Some(solution) if solution.reprojection_error <= self.max_reprojection_error => {
                rotation_matrix_to_euler(solution.rotation.matrix()).into()
            }
            Some(solution) => {
                debug!(
                    "Rejecting pose solve with reprojection error {:.2}px",
                    solution.reprojection_error
                );
                HeadPose::Unsolved
            }
            None => {
                debug!("Pose solve did not converge");
                HeadPose::Unsolved
            }
        }
    }

    /// Estimate the pose for a frame at session time `timestamp`, feeding the
    /// pitch calibration, and classify screen alignment
    pub fn update(
        &mut self,
        landmarks: &FaceLandmarks,
        frame_width: u32,
        frame_height: u32,
        timestamp: Duration,
    ) -> HeadAssessment {
        let pose = self.estimate(landmarks, frame_width, frame_height);
        let pitch = pose.angles().map(|angles| angles.pitch);
        self.pitch_calibration.observe(timestamp, pitch);

        HeadAssessment {
            pose,
            head_ok: self.is_head_aligned(&pose),
        }
    }

    /// Advance the calibration clock on a frame without a face
    pub fn tick(&mut self, timestamp: Duration) {
        self.pitch_calibration.tick(timestamp);
    }

    /// Whether a pose faces the screen relative to the pitch baseline.
    /// Unsolved poses never do.
    #[must_use]
    pub fn is_head_aligned(&self, pose: &HeadPose) -> bool {
        match *pose {
            HeadPose::Solved { yaw, pitch, .. } => {
                let pitch_delta = pitch - self.pitch_baseline();
                yaw.abs() <= self.tolerances.yaw_deg
                    && (-self.tolerances.pitch_down_deg..=self.tolerances.pitch_up_deg).contains(&pitch_delta)
            }
            HeadPose::Unsolved => false,
        }
    }

    /// Pitch treated as "looking straight"; zero until calibration completes
    #[must_use]
    pub fn pitch_baseline(&self) -> f64 {
        self.pitch_calibration.baseline()
    }

    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.pitch_calibration.is_calibrated()
    }
}

/// Solve for the pose of `model` given its pixel projections `image`.
///
/// A linear (DLT) estimate and a frontal-face guess both seed a
/// Levenberg-Marquardt refinement of the reprojection error; the better
/// result wins. Returns `None` if neither converges to a finite pose in
/// front of the camera.
#[must_use]
pub fn solve_pnp(
    model: &[Vector3<f64>; NUM_POSE_POINTS],
    image: &[Point2<f64>; NUM_POSE_POINTS],
    camera: &CameraIntrinsics,
) -> Option<PoseSolution> {
    // Collapsed landmarks are explained by pushing the face to infinity
    let image_centroid = image.iter().map(|p| p.coords).sum::<Vector2<f64>>() / NUM_POSE_POINTS as f64;
    let spread = image.iter().map(|p| (p.coords - image_centroid).norm()).sum::<f64>() / NUM_POSE_POINTS as f64;
    if !spread.is_finite() || spread < MIN_IMAGE_SPREAD_PX {
        return None;
    }

    let normalized = image.map(|p| camera.normalize(&p));

    [dlt_initial_pose(model, &normalized), frontal_initial_pose(model, &normalized)]
        .into_iter()
        .flatten()
        .filter_map(|(rotation, translation)| refine_pose(model, image, camera, rotation, translation))
        .min_by(|a, b| a.reprojection_error.total_cmp(&b.reprojection_error))
}

/// Direct linear transform on normalized image coordinates
fn dlt_initial_pose(
    model: &[Vector3<f64>; NUM_POSE_POINTS],
    normalized: &[Vector2<f64>; NUM_POSE_POINTS],
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    // Condition the model: zero centroid, unit mean distance
    let centroid = model.iter().sum::<Vector3<f64>>() / NUM_POSE_POINTS as f64;
    let scale = model.iter().map(|p| (p - centroid).norm()).sum::<f64>() / NUM_POSE_POINTS as f64;
    if scale < EPSILON {
        return None;
    }

    let mut a = DMatrix::<f64>::zeros(2 * NUM_POSE_POINTS, 12);
    for (i, (point, m)) in model.iter().zip(normalized).enumerate() {
        let p = (point - centroid) / scale;
        let xh = [p.x, p.y, p.z, 1.0];
        for (j, &value) in xh.iter().enumerate() {
            a[(2 * i, j)] = value;
            a[(2 * i, 8 + j)] = -m.x * value;
            a[(2 * i + 1, 4 + j)] = value;
            a[(2 * i + 1, 8 + j)] = -m.y * value;
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (null_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let p = v_t.row(null_idx);

    // Undo the conditioning: P = P' * T
    let mut m = Matrix3::new(p[0], p[1], p[2], p[4], p[5], p[6], p[8], p[9], p[10]) / scale;
    let mut p4 = Vector3::new(p[3], p[7], p[11]) - m * centroid;
    if m.determinant() < 0.0 {
        m = -m;
        p4 = -p4;
    }

    let svd = m.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let lambda = svd.singular_values.mean();
    if !lambda.is_finite() || lambda < EPSILON {
        return None;
    }
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        r = -r;
    }
    let translation = p4 / lambda;
    if (r * centroid + translation).z <= 0.0 {
        return None;
    }

    Some((Rotation3::from_matrix_unchecked(r), translation))
}

/// Face turned towards the camera, distance from the apparent model size
fn frontal_initial_pose(
    model: &[Vector3<f64>; NUM_POSE_POINTS],
    normalized: &[Vector2<f64>; NUM_POSE_POINTS],
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    // Model y points up, image y points down
    let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);

    let centroid = model.iter().sum::<Vector3<f64>>() / NUM_POSE_POINTS as f64;
    let image_centroid = normalized.iter().sum::<Vector2<f64>>() / NUM_POSE_POINTS as f64;

    let model_spread = model.iter().map(|p| (p - centroid).xy().norm_squared()).sum::<f64>();
    let image_spread = normalized.iter().map(|m| (m - image_centroid).norm_squared()).sum::<f64>();
    if image_spread < EPSILON {
        return None;
    }
    let depth = (model_spread / image_spread).sqrt();

    let translation = Vector3::new(image_centroid.x * depth, image_centroid.y * depth, depth) - rotation * centroid;
    Some((rotation, translation))
}

fn reprojection_residuals(
    model: &[Vector3<f64>; NUM_POSE_POINTS],
    image: &[Point2<f64>; NUM_POSE_POINTS],
    camera: &CameraIntrinsics,
    params: &Vector6<f64>,
) -> Option<Residuals> {
    let rotation = Rotation3::new(params.fixed_rows::<3>(0).into_owned());
    let translation = params.fixed_rows::<3>(3).into_owned();

    let mut residuals = Residuals::zeros();
    for (i, (point, observed)) in model.iter().zip(image).enumerate() {
        let projected = camera.project(&(rotation * point + translation))?;
        residuals[2 * i] = projected.x - observed.x;
        residuals[2 * i + 1] = projected.y - observed.y;
    }
    residuals.iter().all(|r| r.is_finite()).then_some(residuals)
}

/// Levenberg-Marquardt minimisation of the pixel reprojection error
fn refine_pose(
    model: &[Vector3<f64>; NUM_POSE_POINTS],
    image: &[Point2<f64>; NUM_POSE_POINTS],
    camera: &CameraIntrinsics,
    rotation: Rotation3<f64>,
    translation: Vector3<f64>,
) -> Option<PoseSolution> {
    let mut params = Vector6::zeros();
    params.fixed_rows_mut::<3>(0).copy_from(&rotation.scaled_axis());
    params.fixed_rows_mut::<3>(3).copy_from(&translation);

    let mut residuals = reprojection_residuals(model, image, camera, &params)?;
    let mut cost = residuals.norm_squared();
    let mut damping = INITIAL_DAMPING;

    for _ in 0..MAX_LM_ITERATIONS {
        let mut jacobian = Jacobian::zeros();
        for k in 0..6 {
            let step = 1e-6 * params[k].abs().max(1.0);
            let mut shifted = params;
            shifted[k] += step;
            let shifted_residuals = reprojection_residuals(model, image, camera, &shifted)?;
            jacobian.set_column(k, &((shifted_residuals - residuals) / step));
        }

        let gradient = jacobian.transpose() * residuals;
        let hessian = jacobian.transpose() * jacobian;

        let mut accepted = None;
        for _ in 0..MAX_DAMPING_RETRIES {
            let mut damped = hessian;
            for k in 0..6 {
                damped[(k, k)] += damping * hessian[(k, k)].max(EPSILON);
            }
            let Some(cholesky) = damped.cholesky() else {
                damping *= 10.0;
                continue;
            };
            let delta = -cholesky.solve(&gradient);
            let candidate = params + delta;
            match reprojection_residuals(model, image, camera, &candidate) {
                Some(candidate_residuals) if candidate_residuals.norm_squared() < cost => {
                    accepted = Some((candidate, candidate_residuals, delta));
                    damping = (damping / 10.0).max(1e-12);
                    break;
                }
                _ => damping *= 10.0,
            }
        }

        let Some((candidate, candidate_residuals, delta)) = accepted else {
            break;
        };
        let new_cost = candidate_residuals.norm_squared();
        let improvement = cost - new_cost;
        params = candidate;
        residuals = candidate_residuals;
        cost = new_cost;

        if delta.norm() < 1e-12 || improvement <= 1e-14 * cost.max(EPSILON) {
            break;
        }
    }

    let reprojection_error = (cost / NUM_POSE_POINTS as f64).sqrt();
    if !reprojection_error.is_finite() {
        return None;
    }

    Some(PoseSolution {
        rotation: Rotation3::new(params.fixed_rows::<3>(0).into_owned()),
        translation: params.fixed_rows::<3>(3).into_owned(),
        reprojection_error,
    })
}

/// Convert rotation matrix to Euler angles (z-y-x: yaw, pitch, roll) in degrees.
///
/// Near gimbal lock (`sy < 1e-6`) yaw and pitch are zeroed and only roll is derived.
#[must_use]
pub fn rotation_matrix_to_euler(r: &Matrix3<f64>) -> EulerAngles {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();

    let (yaw, pitch, roll) = if sy < GIMBAL_EPSILON {
        (0.0, 0.0, (-r[(1, 2)]).atan2(r[(1, 1)]))
    } else {
        (
            r[(1, 0)].atan2(r[(0, 0)]),
            (-r[(2, 0)]).atan2(sy),
            r[(2, 1)].atan2(r[(2, 2)]),
        )
    };

    EulerAngles {
        yaw: yaw.to_degrees(),
        pitch: pitch.to_degrees(),
        roll: roll.to_degrees(),
    }
}
