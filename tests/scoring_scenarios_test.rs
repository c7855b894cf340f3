//! End-to-end scoring scenarios on synthetic faces


use attention_fusion::{
    config::Config,
    gaze::GazeVector,
    landmarks::EyePair,
    pose_estimation::HeadPose,
    scorer::{AttentionScorer, FrameSignals, FusionWeights},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;
use test_helpers::{assert_close, calibrate, frame, on_screen_gaze, zero_gaze, SyntheticFace, CALIBRATION_FRAMES};

fn scorer() -> AttentionScorer {
    AttentionScorer::new(&Config::default()).expect("default config is valid")
}

#[test]
fn test_nominal_frame_scores_one() {
    let mut scorer = scorer();
    let next = calibrate(&mut scorer);
    let face = SyntheticFace::default();

    let mut last = None;
    for i in next..next + 5 {
        last = Some(scorer.process(&frame(i, Some(&face), on_screen_gaze())));
    }
    let score = last.unwrap();

    assert!(score.head_ok());
    assert!(score.eyes.left.is_open && score.eyes.right.is_open);
    assert_close(score.gaze_scores().left, 1.0);
    assert_close(score.mobility.unwrap().stability, 1.0);
    assert_close(score.attention, 1.0);

    let snapshot = scorer.query_service().snapshot();
    assert_close(snapshot.score, 1.0);
    assert!(snapshot.head_looking_at_screen);
    assert!(snapshot.left_eye_open && snapshot.right_eye_open);
}

#[test]
fn test_turned_head_scores_point_eight() {
    let mut scorer = scorer();
    let next = calibrate(&mut scorer);
    let face = SyntheticFace::with_yaw(30.0);

    let mut last = None;
    for i in next..next + 5 {
        last = Some(scorer.process(&frame(i, Some(&face), on_screen_gaze())));
    }
    let score = last.unwrap();

    let yaw = score.head.unwrap().pose.angles().unwrap().yaw;
    assert!((yaw - 30.0).abs() < 0.5, "yaw {yaw}");
    assert!(!score.head_ok());
    assert_close(score.attention, 0.8);
}

#[test]
fn test_everything_failed_scores_zero() {
    let signals = FrameSignals {
        head_ok: false,
        eyes_open: EyePair::new(false, false),
        gaze_scores: EyePair::new(0.0, 0.0),
        stability: 0.0,
    };
    assert_eq!(FusionWeights::default().fuse(&signals), 0.0);
}

#[test]
fn test_closed_eyes_and_averted_gaze() {
    let mut scorer = scorer();
    let next = calibrate(&mut scorer);
    let face = SyntheticFace::with_eyes(0.05, 0.1);
    let away = Some(GazeVector::from_degrees(40.0, 30.0));

    let mut last = None;
    for i in next..next + 5 {
        last = Some(scorer.process(&frame(i, Some(&face), EyePair::new(away, away))));
    }
    let score = last.unwrap();

    assert!(!score.eyes.left.is_open && !score.eyes.right.is_open);
    assert_eq!(score.gaze_scores(), EyePair::new(0.0, 0.0));
    // Head and stability only
    assert_close(score.attention, 0.4);
}

#[test]
fn test_missing_gaze_for_one_eye() {
    let mut scorer = scorer();
    let next = calibrate(&mut scorer);
    let face = SyntheticFace::default();
    let gaze = EyePair::new(on_screen_gaze().left, None);

    let mut last = None;
    for i in next..next + 3 {
        last = Some(scorer.process(&frame(i, Some(&face), gaze)));
    }
    let score = last.unwrap();

    assert!(score.gaze.right.is_none());
    // 0.2 + 0.2 + 0.4 * 0.5 + 0.2
    assert_close(score.attention, 0.8);
    assert_close(scorer.query_service().snapshot().right_gaze_score, 0.0);
}

#[test]
fn test_no_face_frames_score_zero() {
    let mut scorer = scorer();
    let next = calibrate(&mut scorer);
    let query = scorer.query_service();

    for n in 1..=20 {
        let score = scorer.process(&frame(next + n, None, on_screen_gaze()));
        assert_eq!(score.attention, 0.0);
        assert!(!score.face_detected());

        let snapshot = query.snapshot();
        assert_eq!(snapshot.score, 0.0);
        assert!(!snapshot.head_looking_at_screen);
        assert!(!snapshot.left_eye_open);
        assert!(!snapshot.right_eye_open);
    }
}

#[test]
fn test_no_face_during_calibration_falls_back_to_zero_baseline() {
    let mut scorer = scorer();
    for i in 0..60 {
        scorer.process(&frame(i, None, on_screen_gaze()));
    }
    assert!(scorer.is_calibrated());
    assert_eq!(scorer.head_estimator().pitch_baseline(), 0.0);
    assert_eq!(scorer.gaze_calibrator().offsets(), EyePair::new(GazeVector::default(), GazeVector::default()));
}

fn pitched(pitch_deg: f64) -> SyntheticFace {
    SyntheticFace {
        pitch_deg,
        ..SyntheticFace::default()
    }
}

#[test]
fn test_head_alignment_is_relative_to_learned_pitch() {
    let mut scorer = scorer();
    let calibration_face = pitched(20.0);
    for i in 0..CALIBRATION_FRAMES {
        scorer.process(&frame(i, Some(&calibration_face), zero_gaze()));
    }
    assert!(scorer.is_calibrated());
    let baseline = scorer.head_estimator().pitch_baseline();
    assert!((baseline - 20.0).abs() < 0.5, "baseline {baseline}");

    // Default tolerances are 40 degrees either way of the baseline
    for (n, (pitch, aligned)) in [(55.0, true), (-25.0, false), (-15.0, true)].into_iter().enumerate() {
        let score = scorer.process(&frame(CALIBRATION_FRAMES + n as u64, Some(&pitched(pitch)), on_screen_gaze()));
        assert_eq!(score.head_ok(), aligned, "pitch {pitch}");
    }
}

#[test]
fn test_calibration_starts_at_first_frame_of_session() {
    let mut scorer = scorer();
    let face = pitched(10.0);
    let session_start = Duration::from_secs(100);
    let shifted = |i: u64| {
        let mut input = frame(i, Some(&face), zero_gaze());
        input.timestamp += session_start;
        input
    };

    scorer.process(&shifted(0));
    assert!(!scorer.is_calibrated());

    for i in 1..CALIBRATION_FRAMES {
        scorer.process(&shifted(i));
    }
    assert!(scorer.is_calibrated());
    let baseline = scorer.head_estimator().pitch_baseline();
    assert!((baseline - 10.0).abs() < 0.5, "baseline {baseline}");
}

#[test]
fn test_unsolvable_pose_is_not_aligned() {
    let mut scorer = scorer();
    let next = calibrate(&mut scorer);
    let collapsed = attention_fusion::landmarks::FaceLandmarks::from_pairs(&[[320.0, 240.0]; 468]);
    let mut input = frame(next, None, on_screen_gaze());
    input.landmarks = Some(collapsed);

    let score = scorer.process(&input);
    assert_eq!(score.head.unwrap().pose, HeadPose::Unsolved);
    assert!(!score.head_ok());
}

#[test]
fn test_score_is_bounded_under_noise() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut scorer = scorer();

    for i in 0..300 {
        let face = SyntheticFace {
            yaw_deg: rng.gen_range(-40.0..40.0),
            pitch_deg: rng.gen_range(-30.0..30.0),
            ear: EyePair::new(rng.gen_range(0.0..0.4), rng.gen_range(0.0..0.4)),
            ..SyntheticFace::default()
        }
        .shifted(rng.gen_range(-15.0..15.0), rng.gen_range(-15.0..15.0));
        let gaze = EyePair::new(
            Some(GazeVector::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))),
            rng.gen_bool(0.8).then(|| GazeVector::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))),
        );
        let present = rng.gen_bool(0.9);

        let score = scorer.process(&frame(i, present.then_some(&face), gaze));
        assert!((0.0..=1.0).contains(&score.attention), "attention {}", score.attention);

        let snapshot = scorer.query_service().snapshot();
        for value in [snapshot.score, snapshot.avg_short, snapshot.avg_medium, snapshot.avg_long, snapshot.avg_session] {
            assert!((0.0..=1.0).contains(&value));
        }
    }
}
