//! Configuration management for the attention pipeline

use crate::{
    constants::{
        DEFAULT_CALIBRATION_SECS, DEFAULT_EAR_THRESHOLD, DEFAULT_GAZE_HORIZONTAL_TOLERANCE_DEG, DEFAULT_GAZE_SMOOTHING,
        DEFAULT_GAZE_VERTICAL_OFFSET_DEG, DEFAULT_GAZE_VERTICAL_TOLERANCE_DEG, DEFAULT_HORIZONS_SECS,
        DEFAULT_MAX_REPROJECTION_ERROR_PX, DEFAULT_MOBILITY_CAPACITY, DEFAULT_MOBILITY_FULL_SCALE_PX,
        DEFAULT_PITCH_TOLERANCE_DOWN_DEG, DEFAULT_PITCH_TOLERANCE_UP_DEG, DEFAULT_SESSION_CAPACITY,
        DEFAULT_YAW_TOLERANCE_DEG,
    },
    gaze::{GazeCone, GazeSettings},
    landmarks::LandmarkLayout,
    pose_estimation::HeadTolerances,
    scorer::FusionWeights,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Calibration window
    pub calibration: CalibrationConfig,

    /// Head alignment
    pub head_pose: HeadPoseConfig,

    /// Eye openness
    pub eyes: EyeConfig,

    /// Gaze cone and smoothing
    pub gaze: GazeConfig,

    /// Head mobility
    pub mobility: MobilityConfig,

    /// Attention history
    pub history: HistoryConfig,

    /// Fusion weights
    pub weights: FusionWeights,

    /// Landmark indices for pose and eye contours
    pub landmarks: LandmarkLayout,
}

/// Calibration window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Length of the calibration window from session start
    pub duration_secs: f64,
}

/// Head pose tolerances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadPoseConfig {
    /// Maximum absolute yaw
    pub yaw_tolerance_deg: f64,

    /// Maximum pitch above the baseline
    pub pitch_tolerance_up_deg: f64,

    /// Maximum pitch below the baseline
    pub pitch_tolerance_down_deg: f64,

    /// Pose solves with a larger RMS reprojection error are rejected
    pub max_reprojection_error_px: f64,
}

/// Eye openness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    /// Eye aspect ratio above which an eye is open
    pub ear_threshold: f64,
}

/// Gaze configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Horizontal half-width of the screen cone
    pub horizontal_tolerance_deg: f64,

    /// Vertical half-width of the screen cone
    pub vertical_tolerance_deg: f64,

    /// Pitch bias added to corrected gaze
    pub vertical_offset_deg: f64,

    /// Weight of the previous smoothed gaze (0 disables smoothing)
    pub smoothing: f64,
}

/// Head mobility configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilityConfig {
    /// Number of landmark sets kept
    pub history_capacity: usize,

    /// Mean displacement mapping to zero stability
    pub full_scale_px: f64,
}

/// Attention history configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of samples kept for the session average
    pub session_capacity: usize,

    /// Rolling average horizons, shortest first
    pub horizons_secs: [f64; 3],
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_CALIBRATION_SECS,
        }
    }
}

impl Default for HeadPoseConfig {
    fn default() -> Self {
        Self {
            yaw_tolerance_deg: DEFAULT_YAW_TOLERANCE_DEG,
            pitch_tolerance_up_deg: DEFAULT_PITCH_TOLERANCE_UP_DEG,
            pitch_tolerance_down_deg: DEFAULT_PITCH_TOLERANCE_DOWN_DEG,
            max_reprojection_error_px: DEFAULT_MAX_REPROJECTION_ERROR_PX,
        }
    }
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
        }
    }
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            horizontal_tolerance_deg: DEFAULT_GAZE_HORIZONTAL_TOLERANCE_DEG,
            vertical_tolerance_deg: DEFAULT_GAZE_VERTICAL_TOLERANCE_DEG,
            vertical_offset_deg: DEFAULT_GAZE_VERTICAL_OFFSET_DEG,
            smoothing: DEFAULT_GAZE_SMOOTHING,
        }
    }
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_MOBILITY_CAPACITY,
            full_scale_px: DEFAULT_MOBILITY_FULL_SCALE_PX,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            session_capacity: DEFAULT_SESSION_CAPACITY,
            horizons_secs: DEFAULT_HORIZONS_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if !self.calibration.duration_secs.is_finite() || self.calibration.duration_secs < 0.0 {
            return Err(Error::ConfigError(
                "Calibration duration must be a non-negative number of seconds".to_string(),
            ));
        }

        let head = &self.head_pose;
        for (name, value) in [
            ("Yaw tolerance", head.yaw_tolerance_deg),
            ("Pitch up tolerance", head.pitch_tolerance_up_deg),
            ("Pitch down tolerance", head.pitch_tolerance_down_deg),
            ("Reprojection error limit", head.max_reprojection_error_px),
            ("Gaze horizontal tolerance", self.gaze.horizontal_tolerance_deg),
            ("Gaze vertical tolerance", self.gaze.vertical_tolerance_deg),
            ("EAR threshold", self.eyes.ear_threshold),
            ("Mobility full scale", self.mobility.full_scale_px),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::ConfigError(format!("{name} must be positive, got {value}")));
            }
        }

        if !self.gaze.vertical_offset_deg.is_finite() {
            return Err(Error::ConfigError("Gaze vertical offset must be finite".to_string()));
        }
        if !(0.0..1.0).contains(&self.gaze.smoothing) {
            return Err(Error::ConfigError("Gaze smoothing must be in [0, 1)".to_string()));
        }

        if self.mobility.history_capacity < 2 {
            return Err(Error::ConfigError(
                "Mobility history must hold at least 2 frames".to_string(),
            ));
        }
        if self.history.session_capacity == 0 {
            return Err(Error::ConfigError(
                "Session history capacity must be greater than 0".to_string(),
            ));
        }
        if self.history.horizons_secs.iter().any(|h| !(h.is_finite() && *h > 0.0)) {
            return Err(Error::ConfigError(
                "Rolling average horizons must be positive".to_string(),
            ));
        }

        self.weights.validate()
    }

    /// Calibration window length
    #[must_use]
    pub fn calibration_duration(&self) -> Duration {
        Duration::from_secs_f64(self.calibration.duration_secs.max(0.0))
    }

    #[must_use]
    pub fn head_tolerances(&self) -> HeadTolerances {
        HeadTolerances {
            yaw_deg: self.head_pose.yaw_tolerance_deg,
            pitch_up_deg: self.head_pose.pitch_tolerance_up_deg,
            pitch_down_deg: self.head_pose.pitch_tolerance_down_deg,
        }
    }

    #[must_use]
    pub fn gaze_settings(&self) -> GazeSettings {
        GazeSettings {
            cone: GazeCone {
                horizontal_deg: self.gaze.horizontal_tolerance_deg,
                vertical_deg: self.gaze.vertical_tolerance_deg,
            },
            vertical_offset: self.gaze.vertical_offset_deg.to_radians(),
            smoothing: self.gaze.smoothing,
            calibration: self.calibration_duration(),
        }
    }

    /// Rolling average horizons
    #[must_use]
    pub fn horizons(&self) -> [Duration; 3] {
        self.history.horizons_secs.map(|h| Duration::from_secs_f64(h.max(0.0)))
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Attention Fusion Configuration

# Baselines are learned during the first seconds of a session
calibration:
  duration_secs: 5.0

# Head alignment around the calibrated pitch
head_pose:
  yaw_tolerance_deg: 25.0
  pitch_tolerance_up_deg: 40.0
  pitch_tolerance_down_deg: 40.0
  max_reprojection_error_px: 40.0

# Eye openness
eyes:
  ear_threshold: 0.18

# Gaze cone and smoothing
gaze:
  horizontal_tolerance_deg: 15.0
  vertical_tolerance_deg: 10.0
  vertical_offset_deg: 10.0
  smoothing: 0.7

# Head mobility
mobility:
  history_capacity: 20
  full_scale_px: 10.0

# Attention history
history:
  session_capacity: 86400
  horizons_secs: [60.0, 300.0, 1200.0]

# Fusion weights (must sum to 1.0)
weights:
  head: 0.2
  eyes: 0.2
  gaze: 0.4
  mobility: 0.2

# MediaPipe face mesh indices
landmarks:
  pose: [1, 152, 33, 263, 61, 291]
  left_eye: [33, 160, 158, 133, 153, 144]
  right_eye: [263, 387, 385, 362, 380, 373]
"#;
