//! Constants used throughout the library

/// Default calibration window length in seconds
pub const DEFAULT_CALIBRATION_SECS: f64 = 5.0;

/// Head alignment tolerances (degrees)
pub const DEFAULT_YAW_TOLERANCE_DEG: f64 = 25.0;
pub const DEFAULT_PITCH_TOLERANCE_UP_DEG: f64 = 40.0;
pub const DEFAULT_PITCH_TOLERANCE_DOWN_DEG: f64 = 40.0;

/// Mean reprojection error above which a pose solve is rejected
pub const DEFAULT_MAX_REPROJECTION_ERROR_PX: f64 = 40.0;

/// Eye aspect ratio above which an eye counts as open
pub const DEFAULT_EAR_THRESHOLD: f64 = 0.18;

/// Attention cone half-widths (degrees)
pub const DEFAULT_GAZE_HORIZONTAL_TOLERANCE_DEG: f64 = 15.0;
pub const DEFAULT_GAZE_VERTICAL_TOLERANCE_DEG: f64 = 10.0;

/// Constant pitch bias added to every corrected gaze vector (degrees)
pub const DEFAULT_GAZE_VERTICAL_OFFSET_DEG: f64 = 10.0;

/// Weight of the previous smoothed gaze in the IIR filter
pub const DEFAULT_GAZE_SMOOTHING: f64 = 0.7;

/// Number of landmark sets kept for mobility estimation
pub const DEFAULT_MOBILITY_CAPACITY: usize = 20;

/// Mean per-landmark displacement (pixels) that maps to zero stability
pub const DEFAULT_MOBILITY_FULL_SCALE_PX: f64 = 10.0;

/// Attention samples kept for the session average
pub const DEFAULT_SESSION_CAPACITY: usize = 86_400;

/// Rolling average horizons (seconds)
pub const DEFAULT_HORIZONS_SECS: [f64; 3] = [60.0, 300.0, 1200.0];

/// Default fusion weights
pub const DEFAULT_HEAD_WEIGHT: f64 = 0.2;
pub const DEFAULT_EYES_WEIGHT: f64 = 0.2;
pub const DEFAULT_GAZE_WEIGHT: f64 = 0.4;
pub const DEFAULT_MOBILITY_WEIGHT: f64 = 0.2;

/// Tolerance on the weight sum
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Camera principal point sits at the frame center
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

/// Below this `sy` the rotation is treated as gimbal-locked
pub const GIMBAL_EPSILON: f64 = 1e-6;

/// Number of correspondences used by the pose solve
pub const NUM_POSE_POINTS: usize = 6;

/// Number of contour points used for the eye aspect ratio
pub const NUM_EAR_POINTS: usize = 6;

/// Generic 3D face model: nose tip, chin, left eye outer corner,
/// right eye outer corner, left mouth corner, right mouth corner.
pub const FACE_MODEL_POINTS: [[f64; 3]; NUM_POSE_POINTS] = [
    [0.0, 0.0, 0.0],
    [0.0, -330.0, -65.0],
    [-225.0, 170.0, -135.0],
    [225.0, 170.0, -135.0],
    [-150.0, -150.0, -125.0],
    [150.0, -150.0, -125.0],
];

/// MediaPipe face mesh indices matching `FACE_MODEL_POINTS`
pub const MEDIAPIPE_POSE_INDICES: [usize; NUM_POSE_POINTS] = [1, 152, 33, 263, 61, 291];

/// MediaPipe face mesh eye contours, ordered p1..p6 for the EAR formula
pub const MEDIAPIPE_LEFT_EYE_INDICES: [usize; NUM_EAR_POINTS] = [33, 160, 158, 133, 153, 144];
pub const MEDIAPIPE_RIGHT_EYE_INDICES: [usize; NUM_EAR_POINTS] = [263, 387, 385, 362, 380, 373];

/// Landmarks emitted by the MediaPipe face mesh (without iris refinement)
pub const MEDIAPIPE_NUM_LANDMARKS: usize = 468;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
