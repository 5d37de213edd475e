//! Infers which leg does the work in unilateral exercises.

use std::time::{Duration, Instant};

use crate::{
    exercise::UnilateralMode,
    landmark::{BodyPart, Joint, LandmarkFrame, Side, joint_angle},
};

/// Ankle height difference (normalized) that separates a raised foot from noise.
const RAISED_FOOT_MARGIN: f32 = 0.03;
/// Horizontal ankle separation (normalized) that marks a split stance.
const SPLIT_MARGIN: f32 = 0.05;
/// Nose offset from the hip midpoint needed to tell which way the athlete faces.
const FACING_MARGIN: f32 = 0.01;
/// Knee-angle difference in degrees for the bent-knee fallback.
const KNEE_BEND_MARGIN: f32 = 10.0;

#[derive(Clone, Debug)]
pub struct WorkingSideDetector {
    mode: UnilateralMode,
    confirm_frames: u32,
    cooldown: Duration,
    current: Option<Side>,
    candidate: Option<Side>,
    streak: u32,
    last_switch: Option<Instant>,
}

impl WorkingSideDetector {
    pub fn new(mode: UnilateralMode, confirm_frames: u32, cooldown: Duration) -> Self {
        Self {
            mode,
            confirm_frames: confirm_frames.max(1),
            cooldown,
            current: None,
            candidate: None,
            streak: 0,
            last_switch: None,
        }
    }

    pub fn current(&self) -> Option<Side> {
        self.current
    }

    /// Feeds one frame; returns the new working side once a change is confirmed.
    pub fn observe(&mut self, frame: &LandmarkFrame, threshold: f32, now: Instant) -> Option<Side> {
        let Some(seen) = infer(self.mode, frame, threshold) else {
            self.candidate = None;
            self.streak = 0;
            return None;
        };

        if Some(seen) == self.current {
            self.candidate = None;
            self.streak = 0;
            return None;
        }

        if self.candidate == Some(seen) {
            self.streak += 1;
        } else {
            self.candidate = Some(seen);
            self.streak = 1;
        }

        let cooled = self
            .last_switch
            .is_none_or(|at| now.saturating_duration_since(at) >= self.cooldown);
        if self.streak < self.confirm_frames || !cooled {
            return None;
        }

        log::info!("working side confirmed: {}", seen.label());
        self.current = Some(seen);
        self.candidate = None;
        self.streak = 0;
        self.last_switch = Some(now);
        Some(seen)
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.candidate = None;
        self.streak = 0;
        self.last_switch = None;
    }
}

fn infer(mode: UnilateralMode, frame: &LandmarkFrame, threshold: f32) -> Option<Side> {
    let left = frame.part(BodyPart::Ankle, Side::Left);
    let right = frame.part(BodyPart::Ankle, Side::Right);
    if !(left.is_visible(threshold) && right.is_visible(threshold)) {
        return None;
    }

    match mode {
        // image y grows downwards, so the planted foot has the larger y
        UnilateralMode::RaisedFoot => {
            let dy = left.y - right.y;
            if dy > RAISED_FOOT_MARGIN {
                Some(Side::Left)
            } else if -dy > RAISED_FOOT_MARGIN {
                Some(Side::Right)
            } else {
                None
            }
        }
        UnilateralMode::SplitStance => {
            front_foot(frame, threshold, left.x, right.x).or_else(|| bent_knee(frame, threshold))
        }
    }
}

fn front_foot(frame: &LandmarkFrame, threshold: f32, left_x: f32, right_x: f32) -> Option<Side> {
    let nose = frame.get(Joint::Nose);
    let lh = frame.part(BodyPart::Hip, Side::Left);
    let rh = frame.part(BodyPart::Hip, Side::Right);
    if !(nose.is_visible(threshold) && lh.is_visible(threshold) && rh.is_visible(threshold)) {
        return None;
    }
    let facing = nose.x - (lh.x + rh.x) / 2.0;
    if facing.abs() < FACING_MARGIN || (left_x - right_x).abs() < SPLIT_MARGIN {
        return None;
    }
    // the front foot is further along the facing direction
    if (left_x - right_x) * facing.signum() > 0.0 {
        Some(Side::Left)
    } else {
        Some(Side::Right)
    }
}

fn bent_knee(frame: &LandmarkFrame, threshold: f32) -> Option<Side> {
    let knee_angle = |side: Side| {
        let hip = frame.part(BodyPart::Hip, side);
        let knee = frame.part(BodyPart::Knee, side);
        let ankle = frame.part(BodyPart::Ankle, side);
        [hip, knee, ankle]
            .iter()
            .all(|p| p.is_visible(threshold))
            .then(|| joint_angle(&hip, &knee, &ankle))
    };
    let (left, right) = (knee_angle(Side::Left)?, knee_angle(Side::Right)?);
    if (left - right).abs() < KNEE_BEND_MARGIN {
        None
    } else if left < right {
        Some(Side::Left)
    } else {
        Some(Side::Right)
    }
}
