//! Producer loop: pulls frames from a source, scores and publishes them.

use crate::{
    gaze::GazeVector,
    landmarks::{EyePair, FaceLandmarks},
    query::AttentionQueryService,
    scorer::AttentionScorer,
    Error, Result,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Per-frame output of the upstream detectors
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    /// Session time of the frame
    pub timestamp: Duration,
    pub frame_width: u32,
    pub frame_height: u32,
    /// `None` when no face was detected
    pub landmarks: Option<FaceLandmarks>,
    pub gaze: EyePair<Option<GazeVector>>,
}

impl FrameInput {
    /// A frame in which no face was detected
    #[must_use]
    pub fn no_face(timestamp: Duration, frame_width: u32, frame_height: u32) -> Self {
        Self {
            timestamp,
            frame_width,
            frame_height,
            landmarks: None,
            gaze: EyePair::default(),
        }
    }
}

/// Supplier of frames to the producer loop
pub trait FrameSource {
    /// Next frame, or `None` at end of stream
    ///
    /// # Errors
    ///
    /// Any error is fatal to the producer loop
    fn next_frame(&mut self) -> Result<Option<FrameInput>>;
}

/// Frame source over an in-memory iterator
pub struct IterSource<I> {
    frames: I,
}

impl<I: Iterator<Item = FrameInput>> IterSource<I> {
    pub fn new(frames: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl<I: Iterator<Item = FrameInput>> FrameSource for IterSource<I> {
    fn next_frame(&mut self) -> Result<Option<FrameInput>> {
        Ok(self.frames.next())
    }
}

/// Per-eye gaze in a replay record, `[yaw, pitch]` in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplayGaze {
    #[serde(default)]
    pub left: Option<[f64; 2]>,
    #[serde(default)]
    pub right: Option<[f64; 2]>,
}

/// One line of a JSON-lines recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Session time in seconds
    pub t: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub landmarks: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub gaze: ReplayGaze,
}

impl ReplayRecord {
    #[must_use]
    pub fn from_input(frame: &FrameInput) -> Self {
        let to_pair = |g: Option<GazeVector>| g.map(|g| [g.yaw, g.pitch]);
        Self {
            t: frame.timestamp.as_secs_f64(),
            width: frame.frame_width,
            height: frame.frame_height,
            landmarks: frame
                .landmarks
                .as_ref()
                .map(|l| l.points().iter().map(|p| [p.x, p.y]).collect()),
            gaze: ReplayGaze {
                left: to_pair(frame.gaze.left),
                right: to_pair(frame.gaze.right),
            },
        }
    }

    /// # Errors
    ///
    /// Returns a `FrameSource` error if the timestamp is negative or not finite
    pub fn into_input(self) -> Result<FrameInput> {
        let timestamp = Duration::try_from_secs_f64(self.t)
            .map_err(|e| Error::FrameSource(format!("Invalid timestamp {}: {e}", self.t)))?;
        let from_pair = |g: Option<[f64; 2]>| g.map(|[yaw, pitch]| GazeVector::new(yaw, pitch));

        Ok(FrameInput {
            timestamp,
            frame_width: self.width,
            frame_height: self.height,
            landmarks: self.landmarks.map(|pairs| FaceLandmarks::from_pairs(&pairs)),
            gaze: EyePair::new(from_pair(self.gaze.left), from_pair(self.gaze.right)),
        })
    }
}

/// Write frames as a JSON-lines recording
///
/// # Errors
///
/// Returns an error if serialisation or the write fails
pub fn write_replay<W: Write>(mut writer: W, frames: &[FrameInput]) -> Result<()> {
    for frame in frames {
        serde_json::to_writer(&mut writer, &ReplayRecord::from_input(frame))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Frame source reading a JSON-lines recording
pub struct ReplaySource<R> {
    lines: Lines<R>,
    line_number: usize,
    realtime: bool,
    started: Option<(Instant, Duration)>,
}

impl ReplaySource<BufReader<File>> {
    /// Open a recording on disk
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::FrameSource(format!("Cannot open replay {}: {e}", path.display())))?;
        info!("Replaying frames from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            realtime: false,
            started: None,
        }
    }

    /// Sleep between frames so they are delivered at their recorded pace
    #[must_use]
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn pace(&mut self, timestamp: Duration) {
        let (start, first) = *self.started.get_or_insert_with(|| (Instant::now(), timestamp));
        let due = start + timestamp.saturating_sub(first);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
}

impl<R: BufRead> FrameSource for ReplaySource<R> {
    fn next_frame(&mut self) -> Result<Option<FrameInput>> {
        while let Some(line) = self.lines.next() {
            self.line_number += 1;
            let line = line.map_err(|e| Error::FrameSource(format!("Replay read failed: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }

            let record: ReplayRecord = serde_json::from_str(&line)
                .map_err(|e| Error::FrameSource(format!("Replay line {}: {e}", self.line_number)))?;
            let frame = record.into_input()?;
            if self.realtime {
                self.pace(frame.timestamp);
            }
            return Ok(Some(frame));
        }
        Ok(None)
    }
}

/// Shared flag asking the producer loop to stop after the current frame
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Frame rate and processing latency, reported once per second
struct FrameStats {
    last_report: Instant,
    window_frames: u32,
    window_latency: Duration,
    max_latency: Duration,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            last_report: Instant::now(),
            window_frames: 0,
            window_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
        }
    }

    fn record(&mut self, latency: Duration) {
        self.window_frames += 1;
        self.window_latency += latency;
        self.max_latency = self.max_latency.max(latency);

        let elapsed = self.last_report.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = f64::from(self.window_frames) / elapsed.as_secs_f64();
            let mean_latency = self.window_latency / self.window_frames;
            info!(
                "FPS: {fps:.1}, latency: {:.2}ms mean, {:.2}ms max",
                mean_latency.as_secs_f64() * 1000.0,
                self.max_latency.as_secs_f64() * 1000.0
            );
            *self = Self::new();
        }
    }
}

/// Totals for a finished producer run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SessionSummary {
    pub frames: u64,
    /// Session time covered by the scored frames
    pub duration: Duration,
    pub mean_attention: f64,
    /// `100 * mean_attention`
    pub attention_percent: f64,
}

/// Drives an `AttentionScorer` from a `FrameSource`
pub struct AttentionPipeline {
    scorer: AttentionScorer,
    stop: StopHandle,
}

impl AttentionPipeline {
    #[must_use]
    pub fn new(scorer: AttentionScorer) -> Self {
        Self {
            scorer,
            stop: StopHandle::new(),
        }
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[must_use]
    pub fn query_service(&self) -> AttentionQueryService {
        self.scorer.query_service()
    }

    #[must_use]
    pub fn scorer(&self) -> &AttentionScorer {
        &self.scorer
    }

    /// Score frames until the source ends or a stop is requested
    ///
    /// # Errors
    ///
    /// Returns the source's error; frames published before it stay visible
    #[allow(clippy::cast_precision_loss)]
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<SessionSummary> {
        info!("Starting attention pipeline");

        let mut stats = FrameStats::new();
        let mut frames = 0u64;
        let mut attention_sum = 0.0;
        let mut span: Option<(Duration, Duration)> = None;

        while !self.stop.is_stopped() {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("End of frame stream reached");
                    break;
                }
                Err(e) => {
                    error!("Frame source failed: {e}");
                    return Err(e);
                }
            };

            let started = Instant::now();
            let score = self.scorer.process(&frame);
            stats.record(started.elapsed());

            frames += 1;
            attention_sum += score.attention;
            span = Some(span.map_or((score.timestamp, score.timestamp), |(first, last)| {
                (first, last.max(score.timestamp))
            }));
        }

        let mean_attention = if frames == 0 { 0.0 } else { attention_sum / frames as f64 };
        let summary = SessionSummary {
            frames,
            duration: span.map_or(Duration::ZERO, |(first, last)| last - first),
            mean_attention,
            attention_percent: 100.0 * mean_attention,
        };
        info!(
            "Session finished: {} frames over {:.1}s, mean attention {:.3} ({:.1}%)",
            summary.frames,
            summary.duration.as_secs_f64(),
            summary.mean_attention,
            summary.attention_percent
        );
        Ok(summary)
    }

    /// Run the pipeline on its own thread
    pub fn spawn<S>(mut self, mut source: S) -> PipelineHandle
    where
        S: FrameSource + Send + 'static,
    {
        let stop = self.stop_handle();
        let query = self.query_service();
        let join = thread::spawn(move || self.run(&mut source));
        PipelineHandle { join, stop, query }
    }
}

/// Handle to a pipeline running on a producer thread
pub struct PipelineHandle {
    join: JoinHandle<Result<SessionSummary>>,
    stop: StopHandle,
    query: AttentionQueryService,
}

impl PipelineHandle {
    #[must_use]
    pub fn query_service(&self) -> AttentionQueryService {
        self.query.clone()
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Request a stop and wait for the producer to finish
    ///
    /// # Errors
    ///
    /// Returns the producer's error, or an error if its thread panicked
    pub fn stop(self) -> Result<SessionSummary> {
        self.stop.stop();
        self.join()
    }

    /// Wait for the producer to finish on its own
    ///
    /// # Errors
    ///
    /// Returns the producer's error, or an error if its thread panicked
    pub fn join(self) -> Result<SessionSummary> {
        self.join
            .join()
            .map_err(|_| Error::FrameSource("Producer thread panicked".to_string()))?
    }
}
