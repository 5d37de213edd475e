//! Windowed derivative of the smoothed signal, further smoothed with an EMA.
//!
//! The estimator is unit agnostic: feed it values already converted to physical
//! units and oriented so that moving away from the baseline is positive.

use std::{collections::VecDeque, time::Instant};

/// Samples spanned by one finite difference.
pub const VELOCITY_WINDOW: usize = 4;

const VELOCITY_BLEND: f32 = 0.5;
const MIN_DT_SECS: f32 = 1e-4;

#[derive(Clone, Debug)]
pub struct VelocityEstimator {
    samples: VecDeque<(Instant, f32)>,
    velocity: f32,
}

impl VelocityEstimator {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(VELOCITY_WINDOW + 1),
            velocity: 0.0,
        }
    }

    /// Push a sample and return the current velocity in units per second.
    pub fn update(&mut self, timestamp: Instant, value: f32) -> f32 {
        self.samples.push_back((timestamp, value));
        while self.samples.len() > VELOCITY_WINDOW {
            self.samples.pop_front();
        }

        let (Some(&(t0, v0)), Some(&(t1, v1))) = (self.samples.front(), self.samples.back()) else {
            return self.velocity;
        };
        if self.samples.len() < 2 {
            return self.velocity;
        }

        let dt = t1.saturating_duration_since(t0).as_secs_f32();
        if dt < MIN_DT_SECS {
            return self.velocity;
        }

        let raw = (v1 - v0) / dt;
        self.velocity = VELOCITY_BLEND * raw + (1.0 - VELOCITY_BLEND) * self.velocity;
        self.velocity
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.velocity = 0.0;
    }
}

impl Default for VelocityEstimator {
    fn default() -> Self {
        Self::new()
    }
}
