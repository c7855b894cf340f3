//! Real-time screen attention scoring.
//!
//! This library fuses four per-frame signals into a bounded attention score:
//! - head alignment from a `PnP` pose solve against a generic face model
//! - eye openness from the eye aspect ratio
//! - calibrated and smoothed gaze tested against a screen cone
//! - head stability from landmark displacement between frames
//!
//! Landmarks and gaze vectors are produced upstream. The scorer runs on a
//! single producer thread and publishes each frame; any number of readers
//! query consistent snapshots with rolling averages through
//! [`query::AttentionQueryService`].
//!
//! # Examples
//!
//! ## Scoring frames
//!
//! ```no_run
//! use attention_fusion::{config::Config, pipeline::FrameInput, scorer::AttentionScorer};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scorer = AttentionScorer::new(&Config::default())?;
//! let query = scorer.query_service();
//!
//! let frame = FrameInput::no_face(Duration::from_millis(33), 640, 480);
//! let score = scorer.process(&frame);
//! assert_eq!(score.attention, 0.0);
//!
//! let snapshot = query.snapshot();
//! println!("attention {:.2}, 1 min avg {:.2}", snapshot.score, snapshot.avg_short);
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the producer thread
//!
//! ```no_run
//! use attention_fusion::{
//!     config::Config,
//!     pipeline::{AttentionPipeline, ReplaySource},
//!     scorer::AttentionScorer,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("attention.yaml")?;
//! let pipeline = AttentionPipeline::new(AttentionScorer::new(&config)?);
//! let handle = pipeline.spawn(ReplaySource::open("session.jsonl")?.realtime(true));
//!
//! let query = handle.query_service();
//! println!("{}", serde_json::to_string(&query.snapshot())?);
//!
//! let summary = handle.stop()?;
//! println!("{:.1}% attentive", summary.attention_percent);
//! # Ok(())
//! # }
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

/// Landmark sets, per-eye pairs and landmark layouts
pub mod landmarks;

/// Fixed-capacity FIFO buffer
pub mod ring_buffer;

/// Timed calibration windows
pub mod calibration;

/// Head pose estimation module using `PnP` algorithm
pub mod pose_estimation;

/// Eye openness classification
pub mod eye_state;

/// Smoothing filters for angle pairs
pub mod filters;

/// Gaze calibration and attention-cone scoring
pub mod gaze;

/// Head mobility tracking
pub mod mobility;

/// Attention history and rolling averages
pub mod history;

/// Signal fusion
pub mod scorer;

/// Snapshot queries over published scores
pub mod query;

/// Frame sources and the producer loop
pub mod pipeline;

pub use error::{Error, Result};
