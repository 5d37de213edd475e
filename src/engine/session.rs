use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::{
    landmark::Side,
    types::{AbortReason, Phase, RepEvent, Stance},
};

/// Smoothed signal values kept for inspection.
pub const POSITION_HISTORY: usize = 90;

/// Fields that only mean something while a rep is in progress.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RepTracking {
    pub away_started: Option<Instant>,
    pub phase_started: Option<Instant>,
    /// Furthest displacement reached in this rep.
    pub peak: f32,
    pub reversal_at: Option<Instant>,
    /// Away-phase duration, fixed at the reversal.
    pub working_duration: Option<Duration>,
}

/// Running totals for one exercise attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSummary {
    pub exercise: String,
    pub reps_attempted: u32,
    pub reps_completed: u32,
    pub reps: Vec<RepEvent>,
    pub too_shallow: u32,
    pub timed_out: u32,
    pub tracking_lost: u32,
}

impl SessionSummary {
    pub fn new(exercise: impl Into<String>) -> Self {
        Self {
            exercise: exercise.into(),
            ..Self::default()
        }
    }

    pub fn record_abort(&mut self, reason: AbortReason) {
        match reason {
            AbortReason::TooShallow => self.too_shallow += 1,
            AbortReason::TimedOut => self.timed_out += 1,
            AbortReason::TrackingLost => self.tracking_lost += 1,
        }
    }

    pub fn aborted(&self) -> u32 {
        self.too_shallow + self.timed_out + self.tracking_lost
    }

    pub fn best_speed_score(&self) -> Option<u32> {
        self.reps.iter().map(|r| r.speed_score).max()
    }

    pub fn mean_rom(&self) -> Option<f32> {
        if self.reps.is_empty() {
            return None;
        }
        Some(self.reps.iter().map(|r| r.rom).sum::<f32>() / self.reps.len() as f32)
    }
}

/// Mutable state of one attempt, owned and updated only by the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingSession {
    pub phase: Phase,
    pub side: Option<Side>,
    /// Side the smoothed signal was last read from. Kept when the lock is released.
    pub signal_side: Option<Side>,
    pub working_side: Option<Side>,
    pub stance: Option<Stance>,
    pub smoothed: Option<f32>,
    pub displacement: f32,
    pub velocity: f32,
    pub history: VecDeque<f32>,
    /// Start of the current uninterrupted stretch inside the rest band.
    pub stable_since: Option<Instant>,
    /// Set once the rest band has been held for the minimum stable time.
    pub armed: bool,
    pub rep: RepTracking,
    /// `(smoothed signal, displacement)` pairs of a suspected baseline drift.
    pub drift: Vec<(f32, f32)>,
    pub attempts_since_calibration: u32,
    pub summary: SessionSummary,
}

impl TrackingSession {
    pub fn new(exercise: impl Into<String>) -> Self {
        Self {
            phase: Phase::Standing,
            side: None,
            signal_side: None,
            working_side: None,
            stance: None,
            smoothed: None,
            displacement: 0.0,
            velocity: 0.0,
            history: VecDeque::with_capacity(POSITION_HISTORY),
            stable_since: None,
            armed: false,
            rep: RepTracking::default(),
            drift: Vec::new(),
            attempts_since_calibration: 0,
            summary: SessionSummary::new(exercise),
        }
    }

    pub fn push_history(&mut self, value: f32) {
        if self.history.len() == POSITION_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(value);
    }

    /// Back to rest with every per-rep field cleared. Totals are kept.
    pub fn reset_to_rest(&mut self) {
        self.phase = Phase::Standing;
        self.rep = RepTracking::default();
        self.stable_since = None;
        self.armed = false;
        self.drift.clear();
    }

    /// Forgets the signal itself, for when its source or baseline changes.
    pub fn clear_signal(&mut self) {
        self.smoothed = None;
        self.displacement = 0.0;
        self.velocity = 0.0;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QualityLabel, RomUnit};

    fn rep(speed_score: u32, rom: f32) -> RepEvent {
        RepEvent {
            rep_number: 1,
            duration_seconds: 1.0,
            rom,
            rom_unit: RomUnit::Inches,
            speed_score,
            quality: QualityLabel::Half,
            side: None,
        }
    }

    #[test]
    fn test_reset_to_rest_is_idempotent() {
        let mut session = TrackingSession::new("squat");
        session.phase = Phase::Returning;
        session.armed = true;
        session.rep.peak = 12.0;
        session.drift.push((0.5, 1.2));
        session.summary.reps_completed = 3;

        session.reset_to_rest();
        let once = session.clone();
        session.reset_to_rest();
        assert_eq!(session, once);
        assert_eq!(session.phase, Phase::Standing);
        assert_eq!(session.rep, RepTracking::default());
        assert_eq!(session.summary.reps_completed, 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut session = TrackingSession::new("squat");
        for i in 0..(POSITION_HISTORY + 10) {
            session.push_history(i as f32);
        }
        assert_eq!(session.history.len(), POSITION_HISTORY);
        assert_eq!(session.history.front(), Some(&10.0));
    }

    #[test]
    fn test_summary_aggregates() {
        let mut summary = SessionSummary::new("squat");
        assert_eq!(summary.mean_rom(), None);
        summary.reps.push(rep(900, 10.0));
        summary.reps.push(rep(1100, 14.0));
        summary.record_abort(AbortReason::TooShallow);
        summary.record_abort(AbortReason::TimedOut);
        assert_eq!(summary.best_speed_score(), Some(1100));
        assert_eq!(summary.mean_rom(), Some(12.0));
        assert_eq!(summary.aborted(), 2);
    }
}
