//! Producer thread, replay and concurrent queries


use attention_fusion::{
    config::Config,
    pipeline::{write_replay, AttentionPipeline, FrameInput, FrameSource, IterSource, ReplaySource},
    scorer::AttentionScorer,
    Error, Result,
};
use std::fs::File;
use std::io::BufWriter;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;
use test_helpers::{calibration_frames, frame, on_screen_gaze, SyntheticFace, CALIBRATION_FRAMES};

fn session() -> Vec<FrameInput> {
    let face = SyntheticFace::default();
    let mut frames = calibration_frames();
    for i in CALIBRATION_FRAMES..CALIBRATION_FRAMES + 100 {
        let present = i % 10 != 0;
        frames.push(frame(i, present.then_some(&face), on_screen_gaze()));
    }
    frames
}

fn pipeline() -> AttentionPipeline {
    AttentionPipeline::new(AttentionScorer::new(&Config::default()).unwrap())
}

/// Never ends until stopped
struct EndlessSource {
    next: u64,
}

impl FrameSource for EndlessSource {
    fn next_frame(&mut self) -> Result<Option<FrameInput>> {
        self.next += 1;
        thread::sleep(Duration::from_millis(1));
        Ok(Some(frame(self.next, Some(&SyntheticFace::default()), on_screen_gaze())))
    }
}

#[test]
fn test_spawned_pipeline_with_concurrent_readers() {
    let frames = session();
    let total = frames.len() as u64;
    let handle = pipeline().spawn(IterSource::new(frames));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let query = handle.query_service();
            thread::spawn(move || {
                let mut last_frames = 0;
                while last_frames < total {
                    let snapshot = query.snapshot();
                    assert!((0.0..=1.0).contains(&snapshot.score));
                    assert!(snapshot.frames >= last_frames);
                    if snapshot.frames > 0 {
                        // Only no-face frames score zero in this session
                        assert_eq!(snapshot.left_eye_open, snapshot.score > 0.0);
                    }
                    last_frames = snapshot.frames;
                    thread::yield_now();
                }
            })
        })
        .collect();

    let summary = handle.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(summary.frames, total);
    assert!(summary.mean_attention > 0.0 && summary.mean_attention < 1.0);
    assert!((summary.attention_percent - 100.0 * summary.mean_attention).abs() < 1e-9);
}

#[test]
fn test_stop_signal_ends_endless_source() {
    let handle = pipeline().spawn(EndlessSource { next: 0 });
    let query = handle.query_service();
    while query.snapshot().frames < 5 {
        thread::sleep(Duration::from_millis(1));
    }

    let summary = handle.stop().unwrap();
    assert!(summary.frames >= 5);
    assert_eq!(query.snapshot().frames, summary.frames);
}

#[test]
fn test_replay_matches_in_memory_run() {
    let frames = session();
    let file = NamedTempFile::new().unwrap();
    write_replay(BufWriter::new(File::create(file.path()).unwrap()), &frames).unwrap();

    let direct = pipeline().run(&mut IterSource::new(frames.clone())).unwrap();

    let mut replayed = pipeline();
    let summary = replayed.run(&mut ReplaySource::open(file.path()).unwrap()).unwrap();

    assert_eq!(summary.frames, direct.frames);
    assert!((summary.duration.as_secs_f64() - direct.duration.as_secs_f64()).abs() < 1e-6);
    assert!((summary.mean_attention - direct.mean_attention).abs() < 1e-9);
}

#[test]
fn test_replay_open_failure() {
    let result = ReplaySource::open("/nonexistent/session.jsonl");
    assert!(matches!(result, Err(Error::FrameSource(_))));
}

#[test]
fn test_realtime_replay_paces_frames() {
    let frames: Vec<FrameInput> = (0..4).map(|i| frame(i, None, on_screen_gaze())).collect();
    let file = NamedTempFile::new().unwrap();
    write_replay(File::create(file.path()).unwrap(), &frames).unwrap();

    let mut source = ReplaySource::open(file.path()).unwrap().realtime(true);
    let started = std::time::Instant::now();
    let summary = pipeline().run(&mut source).unwrap();

    assert_eq!(summary.frames, 4);
    assert!(started.elapsed() >= Duration::from_millis(300));
}
