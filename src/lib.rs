//! Repetition counting from per-frame pose landmarks.
//!
//! Feed [`LandmarkFrame`]s to a [`RepEngine`] built from an
//! [`ExerciseRegistry`] entry and collect the [`EngineEvent`]s it reports.

pub mod calibration;
pub mod config;
pub mod engine;
pub mod exercise;
pub mod landmark;
pub mod pipeline;
pub mod replay;
pub mod scoring;
pub mod side_lock;
pub mod smoothing;
pub mod synthetic;
pub mod types;
pub mod velocity;

pub use config::EngineConfig;
pub use engine::{RepEngine, SessionSummary};
pub use exercise::{ExerciseDefinition, ExerciseRegistry};
pub use landmark::{Landmark, LandmarkFrame, Side};
pub use types::{AbortReason, EngineEvent, Phase, QualityLabel, RepEvent};
