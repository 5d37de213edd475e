//! The generic repetition state machine.
//!
//! One [`RepEngine`] serves every registered exercise. Per frame it resolves the
//! body side, calibrates if needed, smooths the phase-driving signal, and steps
//! `standing -> moving away -> returning -> standing`, counting a rep on the
//! way back. Faults never surface as errors; they abort to rest and are
//! reported as [`EngineEvent::RepAborted`].

pub mod session;
pub mod signal;
pub mod working_side;

use std::{sync::Arc, time::Instant};

pub use session::{RepTracking, SessionSummary, TrackingSession};
pub use working_side::WorkingSideDetector;

use crate::{
    calibration::{Calibration, CalibrationParams, CalibrationStep, Calibrator},
    config::EngineConfig,
    exercise::{ExerciseDefinition, ExerciseFamily, PhaseThresholds},
    landmark::{LandmarkFrame, Side},
    scoring::speed_score,
    side_lock::{SideDecision, SideLock, SideLockParams, TrackingPointSelector, score_side},
    smoothing::Smoother,
    types::{AbortReason, EngineEvent, Phase, RepEvent},
    velocity::VelocityEstimator,
};

use signal::Reading;

pub struct RepEngine {
    definition: Arc<ExerciseDefinition>,
    visibility_threshold: f32,
    side_lock: SideLock,
    points: [TrackingPointSelector; 2],
    working_side: Option<WorkingSideDetector>,
    calibrator: Calibrator,
    smoother: Smoother,
    velocity: VelocityEstimator,
    session: TrackingSession,
}

impl RepEngine {
    pub fn new(definition: Arc<ExerciseDefinition>, config: &EngineConfig) -> Self {
        let exercise = &definition.config;
        let wide_stance_ratio = match &exercise.family {
            ExerciseFamily::Hinge {
                stance: Some(variant),
            } => Some(variant.wide_ratio),
            _ => None,
        };
        let working_side = exercise.family.unilateral().map(|mode| {
            WorkingSideDetector::new(
                mode,
                config.tracking.working_side_confirm_frames,
                config.tracking.working_side_cooldown(),
            )
        });
        let side_lock = SideLock::new(SideLockParams {
            visibility_threshold: config.tracking.visibility_threshold,
            switch_margin: config.tracking.side_switch_margin,
            loss_tolerance: config.tracking.tracking_loss_frames,
        });
        let calibrator = Calibrator::new(
            CalibrationParams {
                samples_required: config.calibration.samples_required,
                rolling_window: config.calibration.rolling_window,
                estimate_blend: config.calibration.estimate_blend,
                height_inches: config.athlete.height_inches,
                idle_timeout: config.calibration.idle_timeout(),
            },
            exercise.calibration,
            wide_stance_ratio,
        );
        let smoother = Smoother::new(config.smoothing.params(exercise.motion_range));
        let session = TrackingSession::new(definition.id.clone());

        log::info!(
            "engine ready for {} ({})",
            exercise.display_name,
            definition.id
        );

        Self {
            definition,
            visibility_threshold: config.tracking.visibility_threshold,
            side_lock,
            points: Default::default(),
            working_side,
            calibrator,
            smoother,
            velocity: VelocityEstimator::new(),
            session,
        }
    }

    pub fn definition(&self) -> &Arc<ExerciseDefinition> {
        &self.definition
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn locked_side(&self) -> Option<Side> {
        self.side_lock.locked()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_calibrated()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibrator.calibration()
    }

    pub fn summary(&self) -> SessionSummary {
        self.session.summary.clone()
    }

    pub fn into_summary(self) -> SessionSummary {
        self.session.summary
    }

    /// Abandons any rep in progress without reporting it. Calibration and
    /// totals are kept; calling it twice is the same as calling it once.
    pub fn reset(&mut self) {
        self.velocity.reset();
        self.session.reset_to_rest();
    }

    /// Drops the calibration so the next steady frames establish a new one.
    pub fn recalibrate(&mut self) {
        self.calibrator.invalidate();
        self.smoother.reset();
        self.velocity.reset();
        self.session.reset_to_rest();
        self.session.clear_signal();
        self.session.attempts_since_calibration = 0;
    }

    pub fn process(&mut self, frame: &LandmarkFrame) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let now = frame.timestamp;
        let at_rest = self.session.phase.is_rest();

        if at_rest {
            self.detect_working_side(frame, now, &mut events);
        }

        let Some(side) = self.resolve_side(frame, at_rest, &mut events) else {
            return events;
        };

        let family = self.definition.config.family;
        let selector = &mut self.points[side_index(side)];
        let Some(reading) = signal::read(&family, frame, side, selector, self.visibility_threshold)
        else {
            return events;
        };

        if self
            .calibrator
            .should_recalibrate(now, at_rest, self.session.attempts_since_calibration)
        {
            log::info!("calibration unused for too long, recalibrating");
            self.recalibrate();
        }

        let Some(calibration) = self.calibrator.calibration().copied() else {
            self.calibrate(frame, side, &reading, now, &mut events);
            return events;
        };

        let smoothed = self.smoother.apply(reading.signal).value();
        let displacement = signal::displacement(
            &family,
            smoothed,
            calibration.baseline,
            calibration.units_per_normalized_distance,
        );
        let velocity = self.velocity.update(now, displacement);

        self.session.smoothed = Some(smoothed);
        self.session.displacement = displacement;
        self.session.velocity = velocity;
        self.session.push_history(smoothed);

        let thresholds = *self.definition.thresholds_for(self.session.stance);
        self.step(now, &thresholds, &mut events);
        events
    }

    fn detect_working_side(
        &mut self,
        frame: &LandmarkFrame,
        now: Instant,
        events: &mut Vec<EngineEvent>,
    ) {
        let Some(detector) = self.working_side.as_mut() else {
            return;
        };
        let Some(side) = detector.observe(frame, self.visibility_threshold, now) else {
            return;
        };

        let previous = self.session.working_side.replace(side);
        events.push(EngineEvent::WorkingSideChanged(side));
        // each leg has its own baseline
        if previous.is_some() || self.side_lock.locked() != Some(side) {
            self.recalibrate();
        }
    }

    fn resolve_side(
        &mut self,
        frame: &LandmarkFrame,
        at_rest: bool,
        events: &mut Vec<EngineEvent>,
    ) -> Option<Side> {
        let requirement = &self.definition.config.joints;
        let threshold = self.visibility_threshold;
        let left = score_side(frame, requirement, Side::Left, threshold);
        let right = score_side(frame, requirement, Side::Right, threshold);

        let working = self
            .working_side
            .as_ref()
            .and_then(WorkingSideDetector::current);
        let decision = match working {
            Some(Side::Left) => self.side_lock.hold(Side::Left, left, at_rest),
            Some(Side::Right) => self.side_lock.hold(Side::Right, right, at_rest),
            None => self.side_lock.update(left, right, at_rest),
        };

        match decision {
            SideDecision::Locked { side, changed } => {
                if changed {
                    self.on_side_locked(side, events);
                }
                Some(side)
            }
            SideDecision::Lost { frames } => {
                if !at_rest && self.side_lock.is_lost() {
                    log::warn!("no usable side for {frames} frames, abandoning rep");
                    self.abort(AbortReason::TrackingLost, events);
                }
                if self.side_lock.locked().is_none() {
                    self.session.side = None;
                }
                None
            }
        }
    }

    fn on_side_locked(&mut self, side: Side, events: &mut Vec<EngineEvent>) {
        self.session.side = Some(side);
        let previous = self.session.signal_side.replace(side);
        log::info!("locked to {} side", side.label());
        events.push(EngineEvent::SideLocked(side));

        if previous.is_some_and(|p| p != side) {
            // the signal now comes from different joints
            self.smoother.reset();
            self.velocity.reset();
            self.session.clear_signal();
            self.session.drift.clear();
            if !self.calibrator.is_calibrated() {
                self.calibrator.invalidate();
            }
        }
    }

    fn calibrate(
        &mut self,
        frame: &LandmarkFrame,
        side: Side,
        reading: &Reading,
        now: Instant,
        events: &mut Vec<EngineEvent>,
    ) {
        let sample = signal::calibration_sample(
            &self.definition.config.family,
            frame,
            side,
            reading,
            self.visibility_threshold,
        );
        match self.calibrator.offer(sample, now) {
            CalibrationStep::Progress {
                collected,
                required,
            } => events.push(EngineEvent::CalibrationProgress {
                collected,
                required,
            }),
            CalibrationStep::Rejected(guidance) => {
                events.push(EngineEvent::CalibrationRejected(guidance))
            }
            CalibrationStep::Complete(calibration) => {
                self.smoother.reset();
                self.velocity.reset();
                self.session.clear_signal();
                self.session.reset_to_rest();
                self.session.stance = calibration.stance;
                self.session.attempts_since_calibration = 0;
                events.push(EngineEvent::Calibrated {
                    baseline: calibration.baseline,
                    units_per_normalized_distance: calibration.units_per_normalized_distance,
                    stance: calibration.stance,
                });
            }
        }
    }

    fn step(&mut self, now: Instant, t: &PhaseThresholds, events: &mut Vec<EngineEvent>) {
        let displacement = self.session.displacement;
        let velocity = self.session.velocity;

        if let Some(started) = self.session.rep.phase_started {
            if !self.session.phase.is_rest()
                && now.saturating_duration_since(started) > t.max_dwell
            {
                log::warn!(
                    "{} phase exceeded {:?}",
                    self.definition.phase_label(self.session.phase),
                    t.max_dwell
                );
                self.abort(AbortReason::TimedOut, events);
                return;
            }
        }

        match self.session.phase {
            Phase::Standing => self.standing(now, displacement, velocity, t, events),
            Phase::MovingAway => self.moving_away(now, displacement, velocity, t, events),
            Phase::Returning => self.returning(now, displacement, t, events),
        }
    }

    fn standing(
        &mut self,
        now: Instant,
        displacement: f32,
        velocity: f32,
        t: &PhaseThresholds,
        events: &mut Vec<EngineEvent>,
    ) {
        let session = &mut self.session;
        if displacement < t.exit_away() {
            let since = *session.stable_since.get_or_insert(now);
            if !session.armed && now.saturating_duration_since(since) >= t.min_stable {
                log::debug!("stable at baseline, ready for a rep");
                session.armed = true;
            }
        } else if !session.armed {
            session.stable_since = None;
        }

        let triggered =
            velocity > t.min_away_velocity || displacement > t.threshold * t.trigger_multiplier;
        if session.armed && displacement > t.enter_away() && triggered {
            self.start_rep(now, displacement, events);
        } else {
            self.track_drift(displacement, velocity, t, events);
        }
    }

    fn start_rep(&mut self, now: Instant, displacement: f32, events: &mut Vec<EngineEvent>) {
        self.velocity.reset();
        let session = &mut self.session;
        session.rep = RepTracking {
            away_started: Some(now),
            phase_started: Some(now),
            peak: displacement,
            ..RepTracking::default()
        };
        session.armed = false;
        session.stable_since = None;
        session.drift.clear();
        session.summary.reps_attempted += 1;
        session.attempts_since_calibration += 1;
        self.set_phase(Phase::MovingAway, events);
    }

    fn moving_away(
        &mut self,
        now: Instant,
        displacement: f32,
        velocity: f32,
        t: &PhaseThresholds,
        events: &mut Vec<EngineEvent>,
    ) {
        let rep = &mut self.session.rep;
        rep.peak = rep.peak.max(displacement);
        let peak = rep.peak;

        let reversed =
            velocity < -t.min_return_velocity || peak - displacement > t.reversal_distance;
        if !reversed {
            return;
        }

        if peak < t.min_rom {
            log::info!("rep too shallow: {peak:.1} of {:.1} required", t.min_rom);
            self.abort(AbortReason::TooShallow, events);
            return;
        }

        let rep = &mut self.session.rep;
        let started = rep.away_started.unwrap_or(now);
        rep.working_duration = Some(now.saturating_duration_since(started));
        rep.reversal_at = Some(now);
        rep.phase_started = Some(now);
        self.set_phase(Phase::Returning, events);
    }

    fn returning(
        &mut self,
        now: Instant,
        displacement: f32,
        t: &PhaseThresholds,
        events: &mut Vec<EngineEvent>,
    ) {
        let peak = self.session.rep.peak;
        let recovered = if peak > 0.0 {
            (peak - displacement) / peak
        } else {
            1.0
        };
        if recovered >= t.recovery_target && displacement < t.exit_away() {
            self.complete_rep(now, events);
        }
    }

    fn complete_rep(&mut self, now: Instant, events: &mut Vec<EngineEvent>) {
        let rep = std::mem::take(&mut self.session.rep);
        let duration = rep
            .working_duration
            .or_else(|| rep.away_started.map(|s| now.saturating_duration_since(s)))
            .unwrap_or_default()
            .as_secs_f32();
        let rom = rep.peak;
        let exercise = &self.definition.config;

        let summary = &mut self.session.summary;
        summary.reps_completed += 1;
        let event = RepEvent {
            rep_number: summary.reps_completed,
            duration_seconds: duration,
            rom,
            rom_unit: exercise.family.rom_unit(),
            speed_score: speed_score(duration, rom, exercise.reference_depth),
            quality: self.definition.classify(rom),
            side: self.session.side,
        };
        log::info!("{}: {}", exercise.display_name, event.display_text());
        summary.reps.push(event.clone());
        events.push(EngineEvent::RepCompleted(event));

        self.return_to_rest(events);
    }

    fn abort(&mut self, reason: AbortReason, events: &mut Vec<EngineEvent>) {
        if self.session.phase.is_rest() {
            return;
        }
        log::info!("rep aborted: {}", reason.label());
        self.session.summary.record_abort(reason);
        events.push(EngineEvent::RepAborted(reason));
        self.velocity.reset();
        self.return_to_rest(events);
    }

    fn return_to_rest(&mut self, events: &mut Vec<EngineEvent>) {
        self.set_phase(Phase::Standing, events);
        self.session.reset_to_rest();
    }

    fn set_phase(&mut self, to: Phase, events: &mut Vec<EngineEvent>) {
        let from = self.session.phase;
        if from == to {
            return;
        }
        log::debug!(
            "{} -> {}",
            self.definition.phase_label(from),
            self.definition.phase_label(to)
        );
        self.session.phase = to;
        events.push(EngineEvent::PhaseChanged { from, to });
    }

    /// Moves the baseline when the athlete settles slightly off it without
    /// starting a rep.
    fn track_drift(
        &mut self,
        displacement: f32,
        velocity: f32,
        t: &PhaseThresholds,
        events: &mut Vec<EngineEvent>,
    ) {
        let drifting = displacement.abs() > t.drift_tolerance
            && velocity.abs() < t.drift_max_velocity
            && displacement < t.enter_away();
        let Some(smoothed) = self.session.smoothed.filter(|_| drifting) else {
            self.session.drift.clear();
            return;
        };

        let drift = &mut self.session.drift;
        if !drift.is_empty() {
            let mean = drift.iter().map(|(_, d)| d).sum::<f32>() / drift.len() as f32;
            if (displacement - mean).abs() > t.drift_tolerance / 2.0 {
                drift.clear();
            }
        }
        drift.push((smoothed, displacement));
        if drift.len() < t.drift_frames as usize {
            return;
        }

        let baseline = drift.iter().map(|(s, _)| s).sum::<f32>() / drift.len() as f32;
        drift.clear();
        self.calibrator.adjust_baseline(baseline);
        self.velocity.reset();
        log::debug!("baseline drift settled, moved baseline to {baseline:.3}");
        events.push(EngineEvent::BaselineAdjusted { baseline });
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}
