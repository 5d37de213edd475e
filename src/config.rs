use std::{collections::HashMap, fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    exercise::{ExerciseConfig, ExerciseFamily, PhaseThresholds},
    smoothing::SmoothingParams,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub athlete: AthleteConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Per-exercise tuning keyed by exercise id.
    #[serde(default)]
    pub exercise: HashMap<String, ExerciseOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AthleteConfig {
    #[serde(default = "default_height_inches")]
    pub height_inches: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
    /// Visibility lead the other side needs before the lock switches.
    #[serde(default = "default_side_switch_margin")]
    pub side_switch_margin: f32,
    #[serde(default = "default_tracking_loss_frames")]
    pub tracking_loss_frames: u32,
    /// Consecutive frames a new working side must be seen before it is accepted.
    #[serde(default = "default_working_side_confirm_frames")]
    pub working_side_confirm_frames: u32,
    #[serde(default = "default_working_side_cooldown_ms")]
    pub working_side_cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_samples_required")]
    pub samples_required: usize,
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    #[serde(default = "default_idle_recalibration_secs")]
    pub idle_recalibration_secs: f32,
    /// Weight of a fresh calibration in the running reference estimates.
    #[serde(default = "default_estimate_blend")]
    pub estimate_blend: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmoothingConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_outlier_multiplier")]
    pub outlier_multiplier: f32,
    #[serde(default = "default_min_history")]
    pub min_history: usize,
    #[serde(default = "default_max_consecutive_rejections")]
    pub max_consecutive_rejections: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Skip to the newest queued frame instead of processing every frame.
    #[serde(default)]
    pub latest_frame_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExerciseOverride {
    pub threshold: Option<f32>,
    pub hysteresis: Option<f32>,
    pub min_away_velocity: Option<f32>,
    pub min_return_velocity: Option<f32>,
    pub min_rom: Option<f32>,
    pub recovery_target: Option<f32>,
    pub max_dwell_secs: Option<f32>,
    pub min_stable_ms: Option<u64>,
    pub reference_depth: Option<f32>,
}

fn default_height_inches() -> f32 { 68.0 }
fn default_visibility_threshold() -> f32 { 0.4 }
fn default_side_switch_margin() -> f32 { 0.15 }
fn default_tracking_loss_frames() -> u32 { 30 }
fn default_working_side_confirm_frames() -> u32 { 5 }
fn default_working_side_cooldown_ms() -> u64 { 1_500 }
fn default_samples_required() -> usize { 5 }
fn default_rolling_window() -> usize { 3 }
fn default_idle_recalibration_secs() -> f32 { 8.0 }
fn default_estimate_blend() -> f32 { 0.3 }
fn default_alpha() -> f32 { 0.5 }
fn default_outlier_multiplier() -> f32 { 6.0 }
fn default_min_history() -> usize { 10 }
fn default_max_consecutive_rejections() -> u32 { 3 }

impl Default for AthleteConfig {
    fn default() -> Self {
        Self {
            height_inches: default_height_inches(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: default_visibility_threshold(),
            side_switch_margin: default_side_switch_margin(),
            tracking_loss_frames: default_tracking_loss_frames(),
            working_side_confirm_frames: default_working_side_confirm_frames(),
            working_side_cooldown_ms: default_working_side_cooldown_ms(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples_required: default_samples_required(),
            rolling_window: default_rolling_window(),
            idle_recalibration_secs: default_idle_recalibration_secs(),
            estimate_blend: default_estimate_blend(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            outlier_multiplier: default_outlier_multiplier(),
            min_history: default_min_history(),
            max_consecutive_rejections: default_max_consecutive_rejections(),
        }
    }
}

impl SmoothingConfig {
    pub fn params(&self, motion_range: (f32, f32)) -> SmoothingParams {
        SmoothingParams {
            alpha: self.alpha,
            outlier_multiplier: self.outlier_multiplier,
            min_history: self.min_history,
            max_consecutive_rejections: self.max_consecutive_rejections,
            typical_motion_min: motion_range.0,
            typical_motion_max: motion_range.1,
        }
    }
}

impl CalibrationConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.idle_recalibration_secs.max(0.0))
    }
}

impl TrackingConfig {
    pub fn working_side_cooldown(&self) -> Duration {
        Duration::from_millis(self.working_side_cooldown_ms)
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg.to_string())) };

        if !(self.athlete.height_inches > 0.0) {
            return invalid("athlete.height_inches must be positive");
        }
        if !(0.0..1.0).contains(&self.tracking.visibility_threshold) {
            return invalid("tracking.visibility_threshold must be in [0, 1)");
        }
        if !(0.0..1.0).contains(&self.tracking.side_switch_margin) {
            return invalid("tracking.side_switch_margin must be in [0, 1)");
        }
        if self.tracking.tracking_loss_frames == 0 {
            return invalid("tracking.tracking_loss_frames must be at least 1");
        }
        if self.calibration.samples_required == 0 || self.calibration.rolling_window == 0 {
            return invalid("calibration sample counts must be at least 1");
        }
        if !(self.calibration.estimate_blend > 0.0 && self.calibration.estimate_blend <= 1.0) {
            return invalid("calibration.estimate_blend must be in (0, 1]");
        }
        if !(self.smoothing.alpha > 0.0 && self.smoothing.alpha <= 1.0) {
            return invalid("smoothing.alpha must be in (0, 1]");
        }
        if !(self.smoothing.outlier_multiplier > 1.0) {
            return invalid("smoothing.outlier_multiplier must exceed 1");
        }
        Ok(())
    }
}

impl ExerciseOverride {
    /// Applies the set fields to every threshold set of the exercise, the
    /// wide-stance set of a hinge included.
    pub fn apply(&self, config: &mut ExerciseConfig) {
        self.apply_thresholds(&mut config.thresholds);
        if let ExerciseFamily::Hinge {
            stance: Some(variant),
        } = &mut config.family
        {
            self.apply_thresholds(&mut variant.wide);
        }
        if let Some(v) = self.reference_depth {
            config.reference_depth = Some(v);
        }
    }

    fn apply_thresholds(&self, t: &mut PhaseThresholds) {
        if let Some(v) = self.threshold {
            t.threshold = v;
        }
        if let Some(v) = self.hysteresis {
            t.hysteresis = v;
        }
        if let Some(v) = self.min_away_velocity {
            t.min_away_velocity = v;
        }
        if let Some(v) = self.min_return_velocity {
            t.min_return_velocity = v;
        }
        if let Some(v) = self.min_rom {
            t.min_rom = v;
        }
        if let Some(v) = self.recovery_target {
            t.recovery_target = v;
        }
        if let Some(v) = self.max_dwell_secs {
            t.max_dwell = Duration::from_secs_f32(v.max(0.0));
        }
        if let Some(v) = self.min_stable_ms {
            t.min_stable = Duration::from_millis(v);
        }
    }
}
