//! Configuration loading and validation

use attention_fusion::{
    config::{Config, EXAMPLE_CONFIG},
    scorer::AttentionScorer,
    Error,
};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_file_round_trip() {
    let mut config = Config::default();
    config.calibration.duration_secs = 3.0;
    config.gaze.smoothing = 0.5;
    config.weights.gaze = 0.3;
    config.weights.mobility = 0.3;

    let file = NamedTempFile::new().unwrap();
    config.to_file(file.path()).unwrap();
    let loaded = Config::from_file(file.path()).unwrap();

    assert_eq!(loaded, config);
    loaded.validate().unwrap();
}

#[test]
fn test_example_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(EXAMPLE_CONFIG.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_missing_file() {
    let result = Config::from_file("/nonexistent/attention.yaml");
    assert!(matches!(result, Err(Error::IoError(_))));
}

#[test]
fn test_malformed_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"weights: [not, a, map]\n").unwrap();
    assert!(matches!(Config::from_file(file.path()), Err(Error::ConfigError(_))));
}

#[test]
fn test_scorer_rejects_invalid_config() {
    let mut config = Config::default();
    config.weights.head = 0.9;
    assert!(matches!(AttentionScorer::new(&config), Err(Error::ConfigError(_))));

    let mut config = Config::default();
    config.history.session_capacity = 0;
    assert!(AttentionScorer::new(&config).is_err());
}

#[test]
fn test_custom_landmark_layout() {
    let yaml = "landmarks:\n  pose: [30, 8, 36, 45, 48, 54]\n  left_eye: [36, 37, 38, 39, 40, 41]\n  right_eye: [42, 43, 44, 45, 46, 47]\n";
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.landmarks.required_landmarks(), 55);
    assert!(AttentionScorer::new(&config).is_ok());
}
