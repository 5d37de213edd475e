//! Exponential smoothing with adaptive single-frame outlier rejection.
//!
//! The smoother keeps a running estimate of how far the signal typically moves
//! between frames. Once enough history exists, a frame that jumps further than
//! `outlier_multiplier` times that estimate is discarded and the smoothed value
//! stays where it was.

/// Weight of the newest frame delta in the typical-motion estimate.
const TYPICAL_MOTION_BLEND: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothingParams {
    /// EMA blend factor for the tracked value (1.0 = no smoothing).
    pub alpha: f32,
    pub outlier_multiplier: f32,
    /// Accepted frames required before outliers are rejected.
    pub min_history: usize,
    /// A run this long of rejected frames is treated as a real position change.
    pub max_consecutive_rejections: u32,
    pub typical_motion_min: f32,
    pub typical_motion_max: f32,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            outlier_multiplier: 6.0,
            min_history: 10,
            max_consecutive_rejections: 3,
            typical_motion_min: 0.005,
            typical_motion_max: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SmoothOutcome {
    Accepted(f32),
    /// The raw frame was discarded; carries the unchanged smoothed value.
    Rejected(f32),
}

impl SmoothOutcome {
    pub fn value(&self) -> f32 {
        match *self {
            SmoothOutcome::Accepted(v) | SmoothOutcome::Rejected(v) => v,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SmoothOutcome::Rejected(_))
    }
}

#[derive(Clone, Debug)]
pub struct Smoother {
    params: SmoothingParams,
    value: Option<f32>,
    typical_motion: f32,
    history: usize,
    rejected_run: u32,
}

impl Smoother {
    pub fn new(params: SmoothingParams) -> Self {
        Self {
            params,
            value: None,
            typical_motion: params.typical_motion_min,
            history: 0,
            rejected_run: 0,
        }
    }

    pub fn apply(&mut self, raw: f32) -> SmoothOutcome {
        let prev = match self.value {
            Some(prev) => prev,
            None => {
                self.value = Some(raw);
                self.history = 1;
                return SmoothOutcome::Accepted(raw);
            }
        };

        let delta = (raw - prev).abs();
        let trusted = self.history >= self.params.min_history;
        let jump = delta > self.typical_motion * self.params.outlier_multiplier;

        if trusted && jump && self.rejected_run < self.params.max_consecutive_rejections {
            self.rejected_run += 1;
            log::debug!(
                "outlier rejected: delta {delta:.4} vs typical {:.4}",
                self.typical_motion
            );
            return SmoothOutcome::Rejected(prev);
        }

        self.rejected_run = 0;
        self.typical_motion = (self.typical_motion * (1.0 - TYPICAL_MOTION_BLEND)
            + delta * TYPICAL_MOTION_BLEND)
            .clamp(self.params.typical_motion_min, self.params.typical_motion_max);

        let alpha = self.params.alpha;
        let next = alpha * raw + (1.0 - alpha) * prev;
        self.value = Some(next);
        self.history += 1;
        SmoothOutcome::Accepted(next)
    }

    pub fn value(&self) -> Option<f32> {
        self.value
    }

    pub fn typical_motion(&self) -> f32 {
        self.typical_motion
    }

    pub fn history(&self) -> usize {
        self.history
    }

    pub fn reset(&mut self) {
        self.value = None;
        self.typical_motion = self.params.typical_motion_min;
        self.history = 0;
        self.rejected_run = 0;
    }
}
