//! Baseline and physical scale from a run of steady frames at the setup posture.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::{
    exercise::CalibrationProfile,
    types::{CalibrationGuidance, Stance},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationParams {
    pub samples_required: usize,
    pub rolling_window: usize,
    pub estimate_blend: f32,
    pub height_inches: f32,
    pub idle_timeout: Duration,
}

/// One frame's worth of calibration measurements on the locked side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationSample {
    /// Normalized image `y` of the tracked point, used for the steadiness check.
    pub position: f32,
    /// Raw phase-driving signal; its mean becomes the baseline.
    pub signal: f32,
    pub reference_distance: f32,
    pub torso_angle: Option<f32>,
    /// Ankle spread over hip width, when both pairs are visible.
    pub stance_ratio: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    pub baseline: f32,
    pub reference_distance: f32,
    pub units_per_normalized_distance: f32,
    pub torso_angle: Option<f32>,
    pub stance: Option<Stance>,
    pub calibrated_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationStep {
    Progress { collected: usize, required: usize },
    Rejected(CalibrationGuidance),
    Complete(Calibration),
}

#[derive(Clone, Debug)]
pub struct Calibrator {
    params: CalibrationParams,
    profile: CalibrationProfile,
    wide_stance_ratio: Option<f32>,
    samples: Vec<CalibrationSample>,
    recent: VecDeque<f32>,
    reference_estimate: Option<f32>,
    torso_estimate: Option<f32>,
    current: Option<Calibration>,
}

impl Calibrator {
    pub fn new(
        params: CalibrationParams,
        profile: CalibrationProfile,
        wide_stance_ratio: Option<f32>,
    ) -> Self {
        Self {
            params,
            profile,
            wide_stance_ratio,
            samples: Vec::with_capacity(params.samples_required),
            recent: VecDeque::with_capacity(params.rolling_window + 1),
            reference_estimate: None,
            torso_estimate: None,
            current: None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.current.is_some()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.current.as_ref()
    }

    pub fn collected(&self) -> usize {
        self.samples.len()
    }

    pub fn offer(&mut self, sample: Option<CalibrationSample>, now: Instant) -> CalibrationStep {
        let Some(sample) = sample else {
            return CalibrationStep::Rejected(CalibrationGuidance::LowVisibility);
        };

        let (lo, hi) = self.profile.reference_range;
        if !(lo..=hi).contains(&sample.reference_distance) {
            log::debug!(
                "calibration frame refused: reference distance {:.3} outside [{lo}, {hi}]",
                sample.reference_distance
            );
            return CalibrationStep::Rejected(CalibrationGuidance::BadFraming);
        }

        if let Some((min, max)) = self.profile.setup_torso_range {
            let in_setup = sample.torso_angle.is_some_and(|a| (min..=max).contains(&a));
            if !in_setup {
                return CalibrationStep::Rejected(CalibrationGuidance::NotInSetupPosition);
            }
        }

        if !self.recent.is_empty() {
            let mean = self.recent.iter().sum::<f32>() / self.recent.len() as f32;
            let tolerance = self.profile.sample_tolerance * sample.reference_distance;
            if (sample.position - mean).abs() > tolerance {
                log::debug!(
                    "calibration restarted: sample {:.3} vs rolling mean {mean:.3}",
                    sample.position
                );
                self.samples.clear();
                self.recent.clear();
                return CalibrationStep::Rejected(CalibrationGuidance::HoldStill);
            }
        }

        self.samples.push(sample);
        self.recent.push_back(sample.position);
        while self.recent.len() > self.params.rolling_window {
            self.recent.pop_front();
        }

        if self.samples.len() < self.params.samples_required {
            return CalibrationStep::Progress {
                collected: self.samples.len(),
                required: self.params.samples_required,
            };
        }

        let calibration = self.finish(now);
        CalibrationStep::Complete(calibration)
    }

    fn finish(&mut self, now: Instant) -> Calibration {
        let n = self.samples.len() as f32;
        let baseline = self.samples.iter().map(|s| s.signal).sum::<f32>() / n;
        let reference = self.samples.iter().map(|s| s.reference_distance).sum::<f32>() / n;
        let torso = mean_of(self.samples.iter().map(|s| s.torso_angle));

        let blend = self.params.estimate_blend;
        let reference = blend_into(self.reference_estimate, reference, blend);
        self.reference_estimate = Some(reference);
        if let Some(torso) = torso {
            self.torso_estimate = Some(blend_into(self.torso_estimate, torso, blend));
        }

        let stance = self.wide_stance_ratio.map(|wide| {
            match mean_of(self.samples.iter().map(|s| s.stance_ratio)) {
                Some(ratio) if ratio > wide => Stance::Wide,
                _ => Stance::Conventional,
            }
        });

        let calibration = Calibration {
            baseline,
            reference_distance: reference,
            units_per_normalized_distance: self.profile.anatomical_ratio
                * self.params.height_inches
                / reference,
            torso_angle: self.torso_estimate,
            stance,
            calibrated_at: now,
        };
        log::info!(
            "calibrated: baseline {:.3}, {:.1} units per normalized distance{}",
            calibration.baseline,
            calibration.units_per_normalized_distance,
            stance.map(|s| format!(", {} stance", s.label())).unwrap_or_default()
        );

        self.samples.clear();
        self.recent.clear();
        self.current = Some(calibration);
        calibration
    }

    /// Whether an unused calibration has gone stale and should be redone.
    pub fn should_recalibrate(&self, now: Instant, at_rest: bool, attempts: u32) -> bool {
        match &self.current {
            Some(cal) => {
                at_rest
                    && attempts == 0
                    && now.saturating_duration_since(cal.calibrated_at) > self.params.idle_timeout
            }
            None => false,
        }
    }

    pub fn adjust_baseline(&mut self, baseline: f32) {
        if let Some(cal) = self.current.as_mut() {
            cal.baseline = baseline;
        }
    }

    /// Drops the calibration and pending samples. Running estimates survive so
    /// the next calibration blends with them.
    pub fn invalidate(&mut self) {
        self.current = None;
        self.samples.clear();
        self.recent.clear();
    }

    pub fn reset(&mut self) {
        self.invalidate();
        self.reference_estimate = None;
        self.torso_estimate = None;
    }
}

fn blend_into(previous: Option<f32>, fresh: f32, blend: f32) -> f32 {
    match previous {
        Some(prev) => prev * (1.0 - blend) + fresh * blend,
        None => fresh,
    }
}

fn mean_of(values: impl Iterator<Item = Option<f32>>) -> Option<f32> {
    let (sum, count) = values
        .flatten()
        .fold((0.0f32, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f32)
}
