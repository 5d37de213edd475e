//! Body side selection that sticks to one side across frames.
//!
//! A side is only re-evaluated while the athlete is at rest, so a visibility
//! flicker in the middle of a rep can never swap the signal source.

use crate::{
    exercise::JointRequirement,
    landmark::{BodyPart, Landmark, LandmarkFrame, Side},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideLockParams {
    pub visibility_threshold: f32,
    pub switch_margin: f32,
    /// Consecutive unusable frames tolerated before tracking counts as lost.
    pub loss_tolerance: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideScore {
    pub visibility: f32,
    pub valid: bool,
}

/// Mean visibility of the joints `requirement` needs on `side`.
pub fn score_side(
    frame: &LandmarkFrame,
    requirement: &JointRequirement,
    side: Side,
    threshold: f32,
) -> SideScore {
    let mut total = 0.0;
    let mut count = 0usize;
    let mut valid = true;

    for &part in &requirement.parts {
        let point = frame.part(part, side);
        total += point.visibility;
        count += 1;
        valid &= point.is_visible(threshold);
    }

    if requirement.arm_endpoint {
        let wrist = frame.part(BodyPart::Wrist, side);
        let elbow = frame.part(BodyPart::Elbow, side);
        total += wrist.visibility.max(elbow.visibility);
        count += 1;
        valid &= wrist.is_visible(threshold) || elbow.is_visible(threshold);
    }

    SideScore {
        visibility: if count == 0 { 0.0 } else { total / count as f32 },
        valid: valid && count > 0,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideDecision {
    Locked { side: Side, changed: bool },
    Lost { frames: u32 },
}

#[derive(Clone, Debug)]
pub struct SideLock {
    params: SideLockParams,
    locked: Option<Side>,
    lost_frames: u32,
}

impl SideLock {
    pub fn new(params: SideLockParams) -> Self {
        Self {
            params,
            locked: None,
            lost_frames: 0,
        }
    }

    pub fn locked(&self) -> Option<Side> {
        self.locked
    }

    pub fn lost_frames(&self) -> u32 {
        self.lost_frames
    }

    pub fn is_lost(&self) -> bool {
        self.lost_frames > self.params.loss_tolerance
    }

    pub fn update(&mut self, left: SideScore, right: SideScore, at_rest: bool) -> SideDecision {
        let score = |side: Side| match side {
            Side::Left => left,
            Side::Right => right,
        };

        let Some(current) = self.locked else {
            let pick = match (left.valid, right.valid) {
                (true, true) if right.visibility > left.visibility => Side::Right,
                (true, _) => Side::Left,
                (false, true) => Side::Right,
                (false, false) => return self.lose(at_rest),
            };
            return self.lock(pick);
        };

        let cur = score(current);
        let other = score(current.other());
        // a usable locked side is never abandoned
        let switch = at_rest
            && !cur.valid
            && other.valid
            && other.visibility - cur.visibility > self.params.switch_margin;

        if switch {
            log::debug!(
                "side lock {} -> {} ({:.2} vs {:.2})",
                current.label(),
                current.other().label(),
                cur.visibility,
                other.visibility
            );
            self.lock(current.other())
        } else if cur.valid {
            self.lost_frames = 0;
            SideDecision::Locked {
                side: current,
                changed: false,
            }
        } else {
            self.lose(at_rest)
        }
    }

    /// Keeps the lock on `side` regardless of the other side's visibility.
    /// Used once the working limb of a unilateral exercise is known.
    pub fn hold(&mut self, side: Side, score: SideScore, at_rest: bool) -> SideDecision {
        if score.valid {
            self.lock(side)
        } else {
            self.lose(at_rest)
        }
    }

    pub fn release(&mut self) {
        self.locked = None;
        self.lost_frames = 0;
    }

    fn lock(&mut self, side: Side) -> SideDecision {
        let changed = self.locked != Some(side);
        self.locked = Some(side);
        self.lost_frames = 0;
        SideDecision::Locked { side, changed }
    }

    fn lose(&mut self, at_rest: bool) -> SideDecision {
        self.lost_frames = self.lost_frames.saturating_add(1);
        if at_rest && self.is_lost() && self.locked.is_some() {
            log::debug!("releasing side lock after {} lost frames", self.lost_frames);
            self.locked = None;
        }
        SideDecision::Lost {
            frames: self.lost_frames,
        }
    }
}

/// Arm endpoint chosen for this frame. Each variant carries its own landmark.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackingPoint {
    Wrist(Landmark),
    Elbow(Landmark),
    None,
}

impl TrackingPoint {
    pub fn label(&self) -> &'static str {
        match self {
            TrackingPoint::Wrist(_) => "wrist",
            TrackingPoint::Elbow(_) => "elbow",
            TrackingPoint::None => "none",
        }
    }
}

/// Prefers the wrist, falls back to the elbow, and maps elbow readings into
/// wrist space with the offset seen the first time both were visible.
#[derive(Clone, Debug, Default)]
pub struct TrackingPointSelector {
    offset: Option<f32>,
    last: Option<&'static str>,
}

impl TrackingPointSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, wrist: Landmark, elbow: Landmark, threshold: f32) -> TrackingPoint {
        let wrist_ok = wrist.is_visible(threshold);
        let elbow_ok = elbow.is_visible(threshold);

        if wrist_ok && elbow_ok && self.offset.is_none() {
            let offset = wrist.y - elbow.y;
            log::debug!("recorded wrist/elbow offset {offset:.4}");
            self.offset = Some(offset);
        }

        let point = if wrist_ok {
            TrackingPoint::Wrist(wrist)
        } else if elbow_ok {
            TrackingPoint::Elbow(elbow)
        } else {
            TrackingPoint::None
        };

        let label = point.label();
        if self.last.is_some_and(|last| last != label) {
            log::debug!("tracking point switched to {label}");
        }
        self.last = Some(label);
        point
    }

    /// The point expressed in wrist coordinates.
    pub fn corrected(&self, point: TrackingPoint) -> Option<Landmark> {
        match point {
            TrackingPoint::Wrist(lm) => Some(lm),
            TrackingPoint::Elbow(lm) => Some(Landmark {
                y: lm.y + self.offset.unwrap_or(0.0),
                ..lm
            }),
            TrackingPoint::None => None,
        }
    }

    pub fn offset(&self) -> Option<f32> {
        self.offset
    }
}
