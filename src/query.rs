//! Read side of the scorer: the shared board and snapshot queries.
//!
//! The scorer is the only writer. It records each frame's flags and its
//! history sample under one write lock, so a reader holding the read lock
//! always sees a current frame and a history that agree with each other.

use crate::{
    history::{AttentionHistory, AttentionSample},
    landmarks::EyePair,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Fields of the most recent scored frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PublishedFrame {
    pub attention: f64,
    pub head_ok: bool,
    pub eyes_open: EyePair<bool>,
    pub gaze_scores: EyePair<f64>,
    pub timestamp: Duration,
}

#[derive(Debug)]
struct Board {
    current: Option<PublishedFrame>,
    history: AttentionHistory,
    horizons: [Duration; 3],
    frames: u64,
}

/// Scorer state shared between the producer and any number of readers
#[derive(Debug, Clone)]
pub struct SharedBoard {
    inner: Arc<RwLock<Board>>,
}

impl SharedBoard {
    /// # Panics
    ///
    /// Panics if `session_capacity` is 0
    #[must_use]
    pub fn new(session_capacity: usize, horizons: [Duration; 3]) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Board {
                current: None,
                history: AttentionHistory::new(session_capacity),
                horizons,
                frames: 0,
            })),
        }
    }

    /// Replace the current frame and append its sample in one step
    pub fn record(&self, frame: PublishedFrame, sample: AttentionSample) {
        let mut board = self.inner.write();
        board.current = Some(frame);
        board.history.push(sample);
        board.frames += 1;
    }

    fn snapshot(&self) -> AttentionSnapshot {
        let board = self.inner.read();
        let Some(current) = board.current else {
            return AttentionSnapshot::default();
        };

        let now = board.history.latest().map_or(current.timestamp, |s| s.timestamp);
        let [short, medium, long] = board.horizons.map(|h| board.history.window_average(h, now));

        AttentionSnapshot {
            score: current.attention,
            head_looking_at_screen: current.head_ok,
            left_eye_open: current.eyes_open.left,
            right_eye_open: current.eyes_open.right,
            avg_short: short,
            avg_medium: medium,
            avg_long: long,
            avg_session: board.history.session_average(),
            left_gaze_score: current.gaze_scores.left,
            right_gaze_score: current.gaze_scores.right,
            timestamp_secs: now.as_secs_f64(),
            frames: board.frames,
        }
    }

    fn history_len(&self) -> usize {
        self.inner.read().history.len()
    }
}

/// Externally visible attention state, consistent with a single frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttentionSnapshot {
    /// Instantaneous score in [0, 1]
    #[serde(rename = "attention")]
    pub score: f64,
    pub head_looking_at_screen: bool,
    pub left_eye_open: bool,
    pub right_eye_open: bool,
    /// Mean over the first horizon (60 s by default)
    #[serde(rename = "attention_1min_avg")]
    pub avg_short: f64,
    /// Mean over the second horizon (300 s by default)
    #[serde(rename = "attention_5min_avg")]
    pub avg_medium: f64,
    /// Mean over the third horizon (1200 s by default)
    #[serde(rename = "attention_20min_avg")]
    pub avg_long: f64,
    /// Mean over the retained session
    #[serde(rename = "attention_total_avg")]
    pub avg_session: f64,
    pub left_gaze_score: f64,
    pub right_gaze_score: f64,
    /// Session time of the newest sample
    pub timestamp_secs: f64,
    /// Frames scored so far
    pub frames: u64,
}

/// Side-effect-free queries over the published attention state
#[derive(Debug, Clone)]
pub struct AttentionQueryService {
    board: SharedBoard,
}

impl AttentionQueryService {
    #[must_use]
    pub fn new(board: SharedBoard) -> Self {
        Self { board }
    }

    /// Current score, flags and rolling averages. All zero before the first frame.
    #[must_use]
    pub fn snapshot(&self) -> AttentionSnapshot {
        self.board.snapshot()
    }

    /// Samples currently retained for the session average
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.board.history_len()
    }
}
