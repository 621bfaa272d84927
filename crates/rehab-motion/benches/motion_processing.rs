//! Benchmarks for the motion engine.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rehab_core::{
    BuiltInExercise, ExerciseKind, Joint, JointCatalog, JointPosition, Landmark, OptimalRange,
    PoseFrame, Timestamp,
};
use rehab_motion::{
    CalibrationEngine, DeviationScorer, ExerciseTracker, RepStateMachine, TrackerConfig,
};

/// Squat-like knee angle oscillating between 80° and 170° at 30 fps
fn knee_signal(n_frames: usize) -> Vec<(Timestamp, f64)> {
    (0..n_frames)
        .map(|i| {
            let t = i as f64 / 30.0;
            let angle = 125.0 + 45.0 * (t * std::f64::consts::PI / 1.5).cos();
            (Timestamp::from_secs_f64(t), angle)
        })
        .collect()
}

fn create_test_frame(t: Timestamp, knee_angle: f64) -> PoseFrame {
    let theta = knee_angle.to_radians();
    let mut landmarks = BTreeMap::new();
    for (i, landmark) in Landmark::ALL.iter().enumerate() {
        let offset = i as f64 * 0.01;
        landmarks.insert(*landmark, JointPosition::new(0.3 + offset, 0.2 + offset, 0.0, 0.9));
    }
    landmarks.insert(Landmark::LeftHip, JointPosition::new(0.5, 0.3, 0.0, 0.9));
    landmarks.insert(Landmark::LeftKnee, JointPosition::new(0.5, 0.5, 0.0, 0.9));
    landmarks.insert(
        Landmark::LeftAnkle,
        JointPosition::new(0.5 + 0.2 * theta.sin(), 0.5 - 0.2 * theta.cos(), 0.0, 0.9),
    );
    PoseFrame::new(t, 1280, 720, landmarks)
}

fn benchmark_state_machine(c: &mut Criterion) {
    let signal = knee_signal(9000);
    let kind = ExerciseKind::built_in(BuiltInExercise::Squat);

    c.bench_function("rep_state_machine_9000", |b| {
        b.iter(|| {
            let mut machine = RepStateMachine::new(&kind);
            for &(t, angle) in &signal {
                black_box(machine.update(black_box(angle), t));
            }
            machine.reps()
        })
    });
}

fn benchmark_tracker(c: &mut Criterion) {
    let frames: Vec<PoseFrame> = knee_signal(1800)
        .into_iter()
        .map(|(t, angle)| create_test_frame(t, angle))
        .collect();

    c.bench_function("tracker_session_1800", |b| {
        b.iter(|| {
            let mut tracker = ExerciseTracker::new(
                ExerciseKind::built_in(BuiltInExercise::Squat),
                Some(OptimalRange::new(60.0, 180.0)),
                TrackerConfig::default(),
            );
            for frame in &frames {
                black_box(tracker.process(frame));
            }
            tracker.finish()
        })
    });
}

fn benchmark_calibration(c: &mut Criterion) {
    let frames: Vec<PoseFrame> = knee_signal(900)
        .into_iter()
        .map(|(t, angle)| create_test_frame(t, angle))
        .collect();

    c.bench_function("joint_angles_all", |b| {
        b.iter(|| JointCatalog::angles_in(black_box(&frames[0]), 0.5))
    });

    c.bench_function("calibration_900", |b| {
        b.iter(|| {
            let mut engine = CalibrationEngine::new();
            for frame in &frames {
                engine.observe_frame(frame, 0.5);
            }
            engine.finish().map(|r| r.joints.get(&Joint::LeftKnee).copied())
        })
    });
}

fn benchmark_deviation(c: &mut Criterion) {
    let scorer = DeviationScorer::default();
    let reps: Vec<f64> = (0..50).map(|i| 90.0 + (i as f64 * 0.7).sin() * 12.0).collect();

    c.bench_function("deviation_50_reps", |b| {
        b.iter(|| scorer.score(black_box(&reps), Some(OptimalRange::new(60.0, 120.0))))
    });
}

criterion_group!(
    benches,
    benchmark_state_machine,
    benchmark_tracker,
    benchmark_calibration,
    benchmark_deviation
);
criterion_main!(benches);
