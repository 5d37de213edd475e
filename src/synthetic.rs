//! Scripted pose streams for demos and tests.
//!
//! A [`PoseScript`] describes a side-on athlete whose hip height follows a
//! sequence of holds and linear ramps, sampled at a fixed frame rate.

use std::time::{Duration, Instant};

use crate::landmark::{BodyPart, JOINT_COUNT, Landmark, LandmarkFrame, Side};

pub const STANDING_HIP_Y: f32 = 0.5;
pub const KNEE_Y: f32 = 0.7;
const ANKLE_Y: f32 = 0.9;
const TORSO_LENGTH: f32 = 0.3;
const VISIBLE: f32 = 0.95;
const HIDDEN: f32 = 0.1;

#[derive(Clone, Debug)]
pub struct PoseScript {
    start: Instant,
    interval: Duration,
    side: Side,
    hip_y: f32,
    frames: Vec<LandmarkFrame>,
}

impl PoseScript {
    pub fn new(fps: u32) -> Self {
        Self {
            start: Instant::now(),
            interval: Duration::from_secs(1) / fps.max(1),
            side: Side::Left,
            hip_y: STANDING_HIP_Y,
            frames: Vec::new(),
        }
    }

    /// Side facing the camera; the other side is reported as occluded.
    pub fn facing(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn hold(&mut self, frames: u32) -> &mut Self {
        for _ in 0..frames {
            self.push(pose(self.side, self.hip_y, VISIBLE));
        }
        self
    }

    /// Moves the hip linearly to `hip_y` over `frames` frames.
    pub fn ramp_to(&mut self, hip_y: f32, frames: u32) -> &mut Self {
        let from = self.hip_y;
        let frames = frames.max(1);
        for i in 1..=frames {
            self.hip_y = from + (hip_y - from) * i as f32 / frames as f32;
            self.push(pose(self.side, self.hip_y, VISIBLE));
        }
        self.hip_y = hip_y;
        self
    }

    /// Frames where no joint clears a sane visibility threshold.
    pub fn occluded(&mut self, frames: u32) -> &mut Self {
        for _ in 0..frames {
            self.push(pose(self.side, self.hip_y, HIDDEN));
        }
        self
    }

    /// Down to `depth` below standing, a pause, and back up.
    pub fn squat(&mut self, depth: f32, down: u32, pause: u32, up: u32) -> &mut Self {
        self.ramp_to(STANDING_HIP_Y + depth, down)
            .hold(pause)
            .ramp_to(STANDING_HIP_Y, up)
    }

    pub fn frames(&self) -> &[LandmarkFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<LandmarkFrame> {
        self.frames
    }

    fn push(&mut self, landmarks: Vec<Landmark>) {
        let index = self.frames.len() as u32;
        let timestamp = self.start + self.interval * index;
        self.frames.push(LandmarkFrame::new(landmarks, timestamp));
    }
}

/// Side-on standing skeleton with the hip at `hip_y`.
pub fn pose(side: Side, hip_y: f32, visibility: f32) -> Vec<Landmark> {
    let mut landmarks = vec![Landmark::default(); JOINT_COUNT];
    let mut set = |part: BodyPart, y: f32| {
        landmarks[part.on(side).index()] = Landmark::new(0.5, y, 0.0, visibility);
        landmarks[part.on(side.other()).index()] = Landmark::new(0.5, y, 0.0, HIDDEN);
    };
    set(BodyPart::Shoulder, hip_y - TORSO_LENGTH);
    set(BodyPart::Elbow, hip_y - TORSO_LENGTH + 0.15);
    set(BodyPart::Wrist, hip_y - TORSO_LENGTH + 0.28);
    set(BodyPart::Hip, hip_y);
    set(BodyPart::Knee, KNEE_Y);
    set(BodyPart::Ankle, ANKLE_Y);
    landmarks
}
