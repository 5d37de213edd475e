use std::time::{Duration, Instant};

use rep_engine::{
    AbortReason, EngineConfig, EngineEvent, ExerciseRegistry, Landmark, LandmarkFrame, Phase,
    QualityLabel, RepEngine, Side,
    engine::RepTracking,
    landmark::{BodyPart, JOINT_COUNT, Joint},
    scoring::speed_score,
    smoothing::{SmoothingParams, Smoother},
    synthetic::{self, PoseScript},
    types::{CalibrationGuidance, RomUnit},
};

const FRAME: Duration = Duration::from_micros(33_333);

fn engine(exercise: &str) -> RepEngine {
    let registry = ExerciseRegistry::with_builtin().unwrap();
    RepEngine::new(registry.get(exercise).unwrap(), &EngineConfig::default())
}

fn run(engine: &mut RepEngine, frames: &[LandmarkFrame]) -> Vec<EngineEvent> {
    frames.iter().flat_map(|f| engine.process(f)).collect()
}

fn reps(events: &[EngineEvent]) -> Vec<&rep_engine::RepEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::RepCompleted(rep) => Some(rep),
            _ => None,
        })
        .collect()
}

fn aborts(events: &[EngineEvent]) -> Vec<AbortReason> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::RepAborted(reason) => Some(*reason),
            _ => None,
        })
        .collect()
}

/// Hand-built frame stream for poses the squat script cannot express.
struct Stream {
    start: Instant,
    frames: Vec<LandmarkFrame>,
}

impl Stream {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            frames: Vec::new(),
        }
    }

    fn push(&mut self, landmarks: Vec<Landmark>) {
        let timestamp = self.start + FRAME * self.frames.len() as u32;
        self.frames.push(LandmarkFrame::new(landmarks, timestamp));
    }
}

fn set(landmarks: &mut [Landmark], joint: Joint, x: f32, y: f32, visibility: f32) {
    landmarks[joint.index()] = Landmark::new(x, y, 0.0, visibility);
}

#[test]
fn calibration_converges_to_input_mean() {
    let mut engine = engine("squat");
    let mut stream = Stream::new();
    for y in [0.500, 0.503, 0.497, 0.501, 0.499] {
        stream.push(synthetic::pose(Side::Left, y, 0.95));
    }
    let events = run(&mut engine, &stream.frames);

    assert!(engine.is_calibrated());
    let calibration = engine.calibration().unwrap();
    assert!((calibration.baseline - 0.5).abs() < 1e-3);
    let expected_scale = 0.245 * 68.0 / 0.2;
    assert!((calibration.units_per_normalized_distance - expected_scale).abs() < 0.5);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, EngineEvent::Calibrated { .. }))
    );
}

#[test]
fn calibration_restarts_on_unsteady_frame() {
    let mut engine = engine("squat");
    let mut stream = Stream::new();
    for _ in 0..3 {
        stream.push(synthetic::pose(Side::Left, 0.5, 0.95));
    }
    // hip jumps a tenth of the frame; knee stays put
    stream.push(synthetic::pose(Side::Left, 0.6, 0.95));
    stream.push(synthetic::pose(Side::Left, 0.5, 0.95));
    let events = run(&mut engine, &stream.frames);

    let progress: Vec<&EngineEvent> = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                EngineEvent::CalibrationProgress { .. } | EngineEvent::CalibrationRejected(_)
            )
        })
        .collect();
    assert_eq!(
        progress[3],
        &EngineEvent::CalibrationRejected(CalibrationGuidance::HoldStill)
    );
    assert_eq!(
        progress[4],
        &EngineEvent::CalibrationProgress {
            collected: 1,
            required: 5
        }
    );
    assert!(!engine.is_calibrated());
}

#[test]
fn single_frame_outlier_leaves_smoothed_value_unchanged() {
    let mut smoother = Smoother::new(SmoothingParams::default());
    for i in 0..12 {
        smoother.apply(0.5 + 0.002 * (i % 2) as f32);
    }
    let before = smoother.value().unwrap();
    let outcome = smoother.apply(before + 0.2);
    assert!(outcome.is_rejected());
    assert_eq!(smoother.value(), Some(before));
}

#[test]
fn full_squat_counts_exactly_one_rep() {
    let mut script = PoseScript::new(30);
    script
        .hold(5)
        .hold(30)
        .ramp_to(0.68, 18)
        .hold(10)
        .ramp_to(0.5, 18)
        .hold(30);

    let mut engine = engine("squat");
    let events = run(&mut engine, script.frames());
    let reps = reps(&events);

    assert_eq!(reps.len(), 1);
    let rep = reps[0];
    assert_eq!(rep.rep_number, 1);
    assert_eq!(rep.rom_unit, RomUnit::Inches);
    // 0.18 of normalized height at 83.3 inches per unit
    assert!((rep.rom - 15.0).abs() < 0.5, "rom {}", rep.rom);
    assert!(
        (0.6..=1.1).contains(&rep.duration_seconds),
        "duration {}",
        rep.duration_seconds
    );
    assert_eq!(rep.quality, QualityLabel::Parallel);
    assert_eq!(
        rep.speed_score,
        speed_score(rep.duration_seconds, rep.rom, Some(14.0))
    );
    assert!(aborts(&events).is_empty());
    assert_eq!(engine.phase(), Phase::Standing);
}

#[test]
fn shallow_squat_is_rejected() {
    let mut script = PoseScript::new(30);
    script
        .hold(35)
        .ramp_to(0.56, 10)
        .hold(10)
        .ramp_to(0.5, 10)
        .hold(30);

    let mut engine = engine("squat");
    let events = run(&mut engine, script.frames());

    assert!(reps(&events).is_empty());
    assert_eq!(aborts(&events), vec![AbortReason::TooShallow]);
    assert!(events.contains(&EngineEvent::PhaseChanged {
        from: Phase::MovingAway,
        to: Phase::Standing
    }));
    assert_eq!(engine.phase(), Phase::Standing);
    assert_eq!(engine.summary().reps_attempted, 1);
}

#[test]
fn several_reps_are_numbered_in_order() {
    let mut script = PoseScript::new(30);
    script.hold(35);
    for depth in [0.16, 0.18, 0.2] {
        script.squat(depth, 18, 6, 18).hold(30);
    }
    let mut engine = engine("squat");
    let events = run(&mut engine, script.frames());
    let numbers: Vec<u32> = reps(&events).iter().map(|r| r.rep_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    let roms: Vec<f32> = reps(&events).iter().map(|r| r.rom).collect();
    assert!(roms[0] < roms[1] && roms[1] < roms[2]);
}

/// Both sides visible; `left` and `right` set the hip and knee visibility.
fn two_sided(hip_y: f32, left: f32, right: f32) -> Vec<Landmark> {
    let mut landmarks = vec![Landmark::default(); JOINT_COUNT];
    for (side, visibility) in [(Side::Left, left), (Side::Right, right)] {
        set(
            &mut landmarks,
            BodyPart::Hip.on(side),
            0.5,
            hip_y,
            visibility,
        );
        set(
            &mut landmarks,
            BodyPart::Knee.on(side),
            0.5,
            synthetic::KNEE_Y,
            visibility,
        );
    }
    landmarks
}

#[test]
fn side_lock_ignores_marginal_lead_and_mid_rep_flicker() {
    let mut engine = engine("squat");
    let mut stream = Stream::new();
    for _ in 0..35 {
        stream.push(two_sided(0.5, 0.9, 0.8));
    }
    // right side slightly better, below the switch margin
    stream.push(two_sided(0.5, 0.85, 0.95));
    run(&mut engine, &stream.frames);
    assert_eq!(engine.locked_side(), Some(Side::Left));

    let mut stream = Stream {
        start: stream.start,
        frames: Vec::new(),
    };
    let offset = 36;
    for i in 1..=12 {
        let y = 0.5 + 0.01 * i as f32;
        let timestamp = stream.start + FRAME * (offset + i);
        stream
            .frames
            .push(LandmarkFrame::new(two_sided(y, 0.9, 0.8), timestamp));
    }
    run(&mut engine, &stream.frames);
    assert_eq!(engine.phase(), Phase::MovingAway);

    // far better right side mid-rep must not steal the lock
    let timestamp = stream.start + FRAME * (offset + 13);
    let frame = LandmarkFrame::new(two_sided(0.62, 0.45, 1.0), timestamp);
    let events = engine.process(&frame);
    assert_eq!(engine.locked_side(), Some(Side::Left));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, EngineEvent::SideLocked(_)))
    );
}

#[test]
fn speed_scores_match_at_reference_depth() {
    let registry = ExerciseRegistry::with_builtin().unwrap();
    let scores: Vec<u32> = registry
        .ids()
        .into_iter()
        .map(|id| {
            let def = registry.get(id).unwrap();
            let depth = def.config.reference_depth.unwrap();
            speed_score(1.0, depth, Some(depth))
        })
        .collect();
    assert!(scores.windows(2).all(|w| w[0] == w[1]), "{scores:?}");
    assert_eq!(scores[0], 12_000);
}

#[test]
fn reset_twice_matches_reset_once_from_any_phase() {
    let setups: [(f32, u32, Phase); 3] = [
        (0.5, 0, Phase::Standing),
        (0.62, 0, Phase::MovingAway),
        (0.68, 4, Phase::Returning),
    ];
    for (depth, back_up, expected) in setups {
        let mut script = PoseScript::new(30);
        script.hold(35);
        if depth > 0.5 {
            script.ramp_to(depth, ((depth - 0.5) * 100.0).round() as u32);
        }
        if back_up > 0 {
            script.hold(10).ramp_to(depth - 0.01 * back_up as f32, back_up);
        }
        let mut engine = engine("squat");
        run(&mut engine, script.frames());
        assert_eq!(engine.phase(), expected);

        engine.reset();
        let once = engine.session().clone();
        engine.reset();
        assert_eq!(engine.session(), &once);
        assert_eq!(once.phase, Phase::Standing);
        assert_eq!(once.rep, RepTracking::default());
        assert!(!once.armed);
        assert!(once.stable_since.is_none());
    }
}

/// Side-on hinge with the torso `angle` degrees from vertical.
fn hinge_pose(angle: f32) -> Vec<Landmark> {
    let mut landmarks = vec![Landmark::default(); JOINT_COUNT];
    let (sin, cos) = angle.to_radians().sin_cos();
    set(&mut landmarks, Joint::LeftShoulder, 0.5 + 0.3 * sin, 0.5 - 0.3 * cos, 0.95);
    set(&mut landmarks, Joint::LeftHip, 0.5, 0.5, 0.95);
    set(&mut landmarks, Joint::LeftKnee, 0.5, 0.7, 0.95);
    landmarks
}

#[test]
fn deadlift_counts_from_hinged_setup_to_lockout() {
    let mut stream = Stream::new();
    // over the bar at 45 degrees, stand up, hold lockout, lower back
    for _ in 0..35 {
        stream.push(hinge_pose(45.0));
    }
    for i in 1..=30 {
        stream.push(hinge_pose(45.0 - 1.5 * i as f32));
    }
    for _ in 0..10 {
        stream.push(hinge_pose(0.0));
    }
    for i in 1..=30 {
        stream.push(hinge_pose(1.5 * i as f32));
    }
    for _ in 0..30 {
        stream.push(hinge_pose(45.0));
    }

    let mut engine = engine("deadlift");
    let events = run(&mut engine, &stream.frames);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::Calibrated {
            stance: Some(rep_engine::types::Stance::Conventional),
            ..
        }
    )));
    assert!((engine.calibration().unwrap().baseline - 45.0).abs() < 0.5);
    let reps = reps(&events);
    assert_eq!(reps.len(), 1);
    assert_eq!(reps[0].rom_unit, RomUnit::Degrees);
    assert!((reps[0].rom - 45.0).abs() < 1.0, "rom {}", reps[0].rom);
    assert_eq!(reps[0].quality, QualityLabel::Parallel);
    assert!(aborts(&events).is_empty());
}

#[test]
fn deadlift_refuses_upright_setup() {
    let mut stream = Stream::new();
    for _ in 0..20 {
        stream.push(hinge_pose(2.0));
    }
    let mut engine = engine("deadlift");
    let events = run(&mut engine, &stream.frames);
    assert!(!engine.is_calibrated());
    assert!(events.iter().all(|e| !matches!(
        e,
        EngineEvent::CalibrationProgress { .. } | EngineEvent::Calibrated { .. }
    )));
    assert!(events.contains(&EngineEvent::CalibrationRejected(
        CalibrationGuidance::NotInSetupPosition
    )));
}

/// Hinged-over row setup; the hand is raised by `lift` and the wrist can be hidden.
fn row_pose(lift: f32, wrist_visible: bool) -> Vec<Landmark> {
    let mut landmarks = vec![Landmark::default(); JOINT_COUNT];
    set(&mut landmarks, Joint::RightShoulder, 0.6, 0.45, 0.95);
    set(&mut landmarks, Joint::RightHip, 0.85, 0.6, 0.95);
    set(&mut landmarks, Joint::RightElbow, 0.6, 0.6 - lift, 0.95);
    let wrist_visibility = if wrist_visible { 0.95 } else { 0.05 };
    set(
        &mut landmarks,
        Joint::RightWrist,
        0.6,
        0.75 - lift,
        wrist_visibility,
    );
    landmarks
}

#[test]
fn row_keeps_depth_through_elbow_fallback() {
    let mut stream = Stream::new();
    for _ in 0..35 {
        stream.push(row_pose(0.0, true));
    }
    for i in 1..=12 {
        // wrist drops out for the top half of the pull
        stream.push(row_pose(0.01 * i as f32, i < 6));
    }
    for _ in 0..8 {
        stream.push(row_pose(0.12, false));
    }
    for i in (0..12).rev() {
        stream.push(row_pose(0.01 * i as f32, i < 6));
    }
    for _ in 0..30 {
        stream.push(row_pose(0.0, true));
    }

    let mut engine = engine("bent_over_row");
    let events = run(&mut engine, &stream.frames);
    assert_eq!(engine.locked_side(), Some(Side::Right));
    let reps = reps(&events);
    assert_eq!(reps.len(), 1);
    // 0.12 of normalized height at 0.36 * 68 / 0.3 inches per unit
    let expected = 0.12 * 0.36 * 68.0 / 0.3;
    assert!((reps[0].rom - expected).abs() < 0.5, "rom {}", reps[0].rom);
    assert!(aborts(&events).is_empty());
}

#[test]
fn row_needs_hinged_setup() {
    let mut stream = Stream::new();
    for _ in 0..10 {
        let mut pose = row_pose(0.0, true);
        // upright torso
        set(&mut pose, Joint::RightHip, 0.6, 0.75, 0.95);
        stream.push(pose);
    }
    let mut engine = engine("bent_over_row");
    let events = run(&mut engine, &stream.frames);
    assert!(!engine.is_calibrated());
    assert!(events.contains(&EngineEvent::CalibrationRejected(
        CalibrationGuidance::NotInSetupPosition
    )));
}

/// Single-leg stance with the foot of `raised` lifted off the floor.
fn single_leg_pose(raised: Side) -> Vec<Landmark> {
    let mut landmarks = vec![Landmark::default(); JOINT_COUNT];
    for side in [Side::Left, Side::Right] {
        let x = if side == Side::Left { 0.45 } else { 0.55 };
        let ankle_y = if side == raised { 0.8 } else { 0.9 };
        set(&mut landmarks, BodyPart::Hip.on(side), x, 0.5, 0.9);
        set(&mut landmarks, BodyPart::Knee.on(side), x, 0.7, 0.9);
        set(&mut landmarks, BodyPart::Ankle.on(side), x, ankle_y, 0.9);
    }
    landmarks
}

#[test]
fn working_leg_switch_forces_recalibration() {
    let mut engine = engine("single_leg_squat");
    let mut stream = Stream::new();
    for _ in 0..20 {
        stream.push(single_leg_pose(Side::Right));
    }
    let events = run(&mut engine, &stream.frames);
    assert!(events.contains(&EngineEvent::WorkingSideChanged(Side::Left)));
    assert_eq!(engine.locked_side(), Some(Side::Left));
    assert!(engine.is_calibrated());

    let mut stream = Stream {
        start: stream.start,
        frames: Vec::new(),
    };
    // long enough to outlast the switch cooldown and recalibrate
    for i in 20..75u32 {
        let timestamp = stream.start + FRAME * i;
        stream
            .frames
            .push(LandmarkFrame::new(single_leg_pose(Side::Left), timestamp));
    }
    let events = run(&mut engine, &stream.frames);
    let switched = events
        .iter()
        .position(|e| *e == EngineEvent::WorkingSideChanged(Side::Right))
        .expect("working side should switch");
    assert!(
        events[switched..]
            .iter()
            .any(|e| matches!(e, EngineEvent::Calibrated { .. })),
        "new working leg must be recalibrated"
    );
    assert_eq!(engine.locked_side(), Some(Side::Right));
}
