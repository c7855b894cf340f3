//! Rolling averages and history bounds


use attention_fusion::{
    config::Config,
    history::{AttentionHistory, AttentionSample},
    scorer::AttentionScorer,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;
use test_helpers::{frame, on_screen_gaze};

#[test]
fn test_rolling_average_matches_exact_mean() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut history = AttentionHistory::new(10_000);
    let mut samples = Vec::new();

    // Irregular frame spacing over ~25 minutes
    let mut t = Duration::ZERO;
    for _ in 0..5000 {
        t += Duration::from_millis(rng.gen_range(100..500));
        let sample = AttentionSample {
            value: rng.gen_range(0.0..=1.0),
            timestamp: t,
        };
        history.push(sample);
        samples.push(sample);
    }

    for window_secs in [60, 300, 1200] {
        let window = Duration::from_secs(window_secs);
        let cutoff = t.saturating_sub(window);
        let inside: Vec<f64> = samples.iter().filter(|s| s.timestamp >= cutoff).map(|s| s.value).collect();
        let expected = inside.iter().sum::<f64>() / inside.len() as f64;

        let actual = history.window_average(window, t);
        assert!((actual - expected).abs() < 1e-9, "window {window_secs}s: {actual} vs {expected}");
    }

    let expected_total = samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64;
    assert!((history.session_average() - expected_total).abs() < 1e-9);
}

#[test]
fn test_snapshot_windows_exclude_older_frames() {
    let mut scorer = AttentionScorer::new(&Config::default()).unwrap();
    let query = scorer.query_service();

    // 100 s of no-face frames, then nothing else: every average is 0
    for i in 0..1000 {
        scorer.process(&frame(i, None, on_screen_gaze()));
    }
    let snapshot = query.snapshot();
    assert_eq!(snapshot.frames, 1000);
    assert_eq!(snapshot.avg_short, 0.0);
    assert_eq!(snapshot.avg_session, 0.0);
    assert!((snapshot.timestamp_secs - 99.9).abs() < 1e-9);
}

#[test]
fn test_session_history_is_capped() {
    let mut config = Config::default();
    config.history.session_capacity = 500;
    let mut scorer = AttentionScorer::new(&config).unwrap();
    let query = scorer.query_service();

    for i in 0..2000 {
        scorer.process(&frame(i, None, on_screen_gaze()));
        assert!(query.history_len() <= 500);
    }
    assert_eq!(query.history_len(), 500);
    assert_eq!(query.snapshot().frames, 2000);
}

#[test]
fn test_fifo_eviction_keeps_newest() {
    let mut history = AttentionHistory::new(4);
    for i in 0..10u32 {
        history.push(AttentionSample {
            value: f64::from(i) / 10.0,
            timestamp: Duration::from_secs(u64::from(i)),
        });
    }
    let kept: Vec<u64> = history.iter().map(|s| s.timestamp.as_secs()).collect();
    assert_eq!(kept, vec![6, 7, 8, 9]);
}
