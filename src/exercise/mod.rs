//! Per-exercise configuration consumed by the generic rep state machine.
//!
//! An exercise is data: a family describing where the phase-driving signal comes
//! from, the thresholds the machine applies to it, and how calibration turns
//! normalized distances into physical units.

pub mod catalog;
mod registry;

use std::time::Duration;

use crate::{
    landmark::BodyPart,
    scoring::{QualityFn, QualityTiers, step_quality},
    types::{Phase, QualityLabel, RomUnit, Stance},
};

pub use registry::{ExerciseRegistry, RegistryBuilder, RegistryError};

/// Image direction that counts as moving away from the baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

impl Direction {
    /// Multiplier turning a change in image `y` into away-positive displacement.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Down => 1.0,
            Direction::Up => -1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnilateralMode {
    /// One foot off the floor; the planted leg works.
    RaisedFoot,
    /// Feet split front/back; the front leg works.
    SplitStance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmReference {
    /// Torso length, for presses where the arm is folded at the start.
    ShoulderToHip,
    /// Hanging arm length, for pulls from a hinged-over setup.
    ShoulderToPoint,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StanceVariant {
    /// Ankle-spread to hip-width ratio above which the stance counts as wide.
    pub wide_ratio: f32,
    pub wide: PhaseThresholds,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExerciseFamily {
    /// A single joint's vertical position drives the phases (squat family).
    Displacement {
        part: BodyPart,
        direction: Direction,
        reference: (BodyPart, BodyPart),
        unilateral: Option<UnilateralMode>,
    },
    /// Torso angle from vertical drives the phases (hinge family). Rest is the
    /// hinged setup and a rep rises toward an upright lockout.
    Hinge { stance: Option<StanceVariant> },
    /// Wrist, or elbow as fallback, drives the phases (press and pull families).
    ArmEndpoint {
        direction: Direction,
        reference: ArmReference,
    },
}

impl ExerciseFamily {
    pub fn tracks_arm_endpoint(&self) -> bool {
        matches!(self, ExerciseFamily::ArmEndpoint { .. })
    }

    pub fn is_angle_based(&self) -> bool {
        matches!(self, ExerciseFamily::Hinge { .. })
    }

    pub fn unilateral(&self) -> Option<UnilateralMode> {
        match self {
            ExerciseFamily::Displacement { unilateral, .. } => *unilateral,
            _ => None,
        }
    }

    pub fn rom_unit(&self) -> RomUnit {
        if self.is_angle_based() {
            RomUnit::Degrees
        } else {
            RomUnit::Inches
        }
    }
}

/// Numeric knobs of the generic state machine, in the exercise's ROM unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseThresholds {
    pub threshold: f32,
    pub hysteresis: f32,
    /// Displacement of `threshold * trigger_multiplier` starts a rep without velocity.
    pub trigger_multiplier: f32,
    pub min_away_velocity: f32,
    pub min_return_velocity: f32,
    /// Retreat from the furthest point that counts as a reversal on its own.
    pub reversal_distance: f32,
    pub min_rom: f32,
    /// Fraction of the ROM that must be recovered before the rep completes.
    pub recovery_target: f32,
    pub max_dwell: Duration,
    pub min_stable: Duration,
    pub drift_tolerance: f32,
    pub drift_max_velocity: f32,
    pub drift_frames: u32,
}

impl PhaseThresholds {
    pub fn enter_away(&self) -> f32 {
        self.threshold + self.hysteresis
    }

    pub fn exit_away(&self) -> f32 {
        self.threshold - self.hysteresis
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.threshold > 0.0) {
            return Err("threshold must be positive".into());
        }
        if !(self.hysteresis >= 0.0 && self.hysteresis < self.threshold) {
            return Err("hysteresis must be in [0, threshold)".into());
        }
        if !(self.min_rom > self.enter_away()) {
            return Err("min_rom must exceed threshold + hysteresis".into());
        }
        if !(self.recovery_target > 0.0 && self.recovery_target <= 1.0) {
            return Err("recovery_target must be in (0, 1]".into());
        }
        if self.max_dwell.is_zero() {
            return Err("max_dwell must be non-zero".into());
        }
        if self.drift_frames == 0 {
            return Err("drift_frames must be at least 1".into());
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationProfile {
    /// Expected reference-segment length as a fraction of body height.
    pub anatomical_ratio: f32,
    /// Plausible normalized reference distance; outside it the framing is off.
    pub reference_range: (f32, f32),
    /// Allowed sample deviation as a fraction of the reference distance.
    pub sample_tolerance: f32,
    /// Torso angle (degrees from vertical) the setup posture must fall in.
    pub setup_torso_range: Option<(f32, f32)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JointRequirement {
    pub parts: Vec<BodyPart>,
    /// Needs a wrist, or an elbow as fallback, on the tracked side.
    pub arm_endpoint: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseNames {
    pub away: &'static str,
    pub returning: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseConfig {
    pub display_name: &'static str,
    pub family: ExerciseFamily,
    pub thresholds: PhaseThresholds,
    pub calibration: CalibrationProfile,
    /// Clamp range for the smoother's typical frame-to-frame motion, in signal units.
    pub motion_range: (f32, f32),
    pub quality: QualityTiers,
    pub reference_depth: Option<f32>,
    pub joints: JointRequirement,
    pub phase_names: PhaseNames,
}

impl ExerciseConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.thresholds.validate()?;
        if let ExerciseFamily::Hinge {
            stance: Some(variant),
        } = &self.family
        {
            variant.wide.validate().map_err(|e| format!("wide stance: {e}"))?;
        }
        let (lo, hi) = self.calibration.reference_range;
        if !(lo > 0.0 && lo < hi) {
            return Err("reference_range must be increasing and positive".into());
        }
        if !(self.calibration.anatomical_ratio > 0.0) {
            return Err("anatomical_ratio must be positive".into());
        }
        if !(self.motion_range.0 > 0.0 && self.motion_range.0 <= self.motion_range.1) {
            return Err("motion_range must be increasing and positive".into());
        }
        let q = &self.quality;
        if !(q.half <= q.parallel && q.parallel <= q.deep) {
            return Err("quality tiers must be non-decreasing".into());
        }
        if self.joints.parts.is_empty() && !self.joints.arm_endpoint {
            return Err("at least one joint is required".into());
        }
        Ok(())
    }
}

/// A registered exercise: immutable configuration plus its behavioural hooks.
#[derive(Clone, Debug)]
pub struct ExerciseDefinition {
    pub id: String,
    pub config: ExerciseConfig,
    pub quality_fn: QualityFn,
}

impl ExerciseDefinition {
    pub fn new(id: impl Into<String>, config: ExerciseConfig) -> Self {
        Self {
            id: id.into(),
            config,
            quality_fn: step_quality,
        }
    }

    pub fn with_quality_fn(mut self, quality_fn: QualityFn) -> Self {
        self.quality_fn = quality_fn;
        self
    }

    pub fn classify(&self, rom: f32) -> QualityLabel {
        (self.quality_fn)(rom, &self.config.quality)
    }

    /// Threshold set for a detected stance; only hinge exercises distinguish them.
    pub fn thresholds_for(&self, stance: Option<Stance>) -> &PhaseThresholds {
        match (&self.config.family, stance) {
            (
                ExerciseFamily::Hinge {
                    stance: Some(variant),
                },
                Some(Stance::Wide),
            ) => &variant.wide,
            _ => &self.config.thresholds,
        }
    }

    pub fn phase_label(&self, phase: Phase) -> &'static str {
        match phase {
            Phase::Standing => "standing",
            Phase::MovingAway => self.config.phase_names.away,
            Phase::Returning => self.config.phase_names.returning,
        }
    }
}
