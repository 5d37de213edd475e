//! Built-in exercises. Values are empirically tuned starting points; every
//! threshold can be overridden per exercise from the engine config.

use std::time::Duration;

use super::{
    ArmReference, CalibrationProfile, Direction, ExerciseConfig, ExerciseDefinition,
    ExerciseFamily, JointRequirement, PhaseNames, PhaseThresholds, RegistryBuilder,
    RegistryError, StanceVariant, UnilateralMode,
};
use crate::{landmark::BodyPart, scoring::QualityTiers};

const MAX_DWELL: Duration = Duration::from_secs(6);
const MIN_STABLE: Duration = Duration::from_millis(800);
const DRIFT_FRAMES: u32 = 10;

// Segment lengths as a fraction of standing height.
const THIGH_RATIO: f32 = 0.245;
const TORSO_RATIO: f32 = 0.30;
const ARM_RATIO: f32 = 0.36;

/// Normalized image distance per frame considered typical for coordinate signals.
const COORDINATE_MOTION: (f32, f32) = (0.005, 0.05);
/// Degrees per frame considered typical for torso-angle signals.
const ANGLE_MOTION: (f32, f32) = (0.5, 5.0);

/// Least torso lean from vertical accepted as a hinged setup.
const MIN_HINGE_DEGREES: f32 = 30.0;

const SQUAT_PHASES: PhaseNames = PhaseNames {
    away: "descending",
    returning: "ascending",
};

pub fn register_builtin(builder: RegistryBuilder) -> Result<RegistryBuilder, RegistryError> {
    builder
        .register(squat())?
        .register(front_squat())?
        .register(box_squat())?
        .register(split_squat())?
        .register(single_leg_squat())?
        .register(deadlift())?
        .register(romanian_deadlift())?
        .register(overhead_press())?
        .register(bent_over_row())?
        .register(dumbbell_row())
}

fn inch_thresholds(threshold: f32, min_rom: f32, recovery_target: f32) -> PhaseThresholds {
    PhaseThresholds {
        threshold,
        hysteresis: 0.5,
        trigger_multiplier: 2.0,
        min_away_velocity: 4.0,
        min_return_velocity: 3.0,
        reversal_distance: 2.0,
        min_rom,
        recovery_target,
        max_dwell: MAX_DWELL,
        min_stable: MIN_STABLE,
        drift_tolerance: 1.0,
        drift_max_velocity: 1.5,
        drift_frames: DRIFT_FRAMES,
    }
}

fn degree_thresholds(threshold: f32, min_rom: f32, recovery_target: f32) -> PhaseThresholds {
    PhaseThresholds {
        threshold,
        hysteresis: 3.0,
        trigger_multiplier: 2.0,
        min_away_velocity: 20.0,
        min_return_velocity: 15.0,
        reversal_distance: 8.0,
        min_rom,
        recovery_target,
        max_dwell: MAX_DWELL,
        min_stable: MIN_STABLE,
        drift_tolerance: 4.0,
        drift_max_velocity: 5.0,
        drift_frames: DRIFT_FRAMES,
    }
}

fn leg_calibration() -> CalibrationProfile {
    CalibrationProfile {
        anatomical_ratio: THIGH_RATIO,
        reference_range: (0.05, 0.45),
        sample_tolerance: 0.15,
        setup_torso_range: None,
    }
}

fn squat_config(
    display_name: &'static str,
    thresholds: PhaseThresholds,
    quality: QualityTiers,
    reference_depth: f32,
    unilateral: Option<UnilateralMode>,
) -> ExerciseConfig {
    let mut parts = vec![BodyPart::Hip, BodyPart::Knee];
    if unilateral.is_some() {
        parts.push(BodyPart::Ankle);
    }
    ExerciseConfig {
        display_name,
        family: ExerciseFamily::Displacement {
            part: BodyPart::Hip,
            direction: Direction::Down,
            reference: (BodyPart::Hip, BodyPart::Knee),
            unilateral,
        },
        thresholds,
        calibration: leg_calibration(),
        motion_range: COORDINATE_MOTION,
        quality,
        reference_depth: Some(reference_depth),
        joints: JointRequirement {
            parts,
            arm_endpoint: false,
        },
        phase_names: SQUAT_PHASES,
    }
}

fn squat() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "squat",
        squat_config(
            "Squat",
            inch_thresholds(3.0, 6.0, 0.80),
            QualityTiers {
                half: 8.0,
                parallel: 12.0,
                deep: 16.0,
            },
            14.0,
            None,
        ),
    )
}

fn front_squat() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "front_squat",
        squat_config(
            "Front Squat",
            inch_thresholds(3.0, 6.0, 0.85),
            QualityTiers {
                half: 8.0,
                parallel: 12.0,
                deep: 16.0,
            },
            14.0,
            None,
        ),
    )
}

fn box_squat() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "box_squat",
        squat_config(
            "Box Squat",
            inch_thresholds(3.0, 5.0, 0.80),
            QualityTiers {
                half: 7.0,
                parallel: 10.0,
                deep: 14.0,
            },
            12.0,
            None,
        ),
    )
}

fn split_squat() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "split_squat",
        squat_config(
            "Split Squat",
            inch_thresholds(2.0, 4.0, 0.80),
            QualityTiers {
                half: 5.0,
                parallel: 8.0,
                deep: 11.0,
            },
            9.0,
            Some(UnilateralMode::SplitStance),
        ),
    )
}

fn single_leg_squat() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "single_leg_squat",
        squat_config(
            "Single-Leg Squat",
            inch_thresholds(2.0, 4.0, 0.75),
            QualityTiers {
                half: 5.0,
                parallel: 8.0,
                deep: 11.0,
            },
            8.0,
            Some(UnilateralMode::RaisedFoot),
        ),
    )
}

fn hinge_config(
    display_name: &'static str,
    thresholds: PhaseThresholds,
    stance: Option<StanceVariant>,
) -> ExerciseConfig {
    ExerciseConfig {
        display_name,
        family: ExerciseFamily::Hinge { stance },
        thresholds,
        calibration: CalibrationProfile {
            anatomical_ratio: TORSO_RATIO,
            reference_range: (0.08, 0.5),
            sample_tolerance: 0.15,
            setup_torso_range: Some((MIN_HINGE_DEGREES, 90.0)),
        },
        motion_range: ANGLE_MOTION,
        quality: QualityTiers {
            half: 20.0,
            parallel: 35.0,
            deep: 50.0,
        },
        reference_depth: Some(45.0),
        joints: JointRequirement {
            parts: vec![BodyPart::Shoulder, BodyPart::Hip, BodyPart::Knee],
            arm_endpoint: false,
        },
        phase_names: PhaseNames {
            away: "rising",
            returning: "lowering",
        },
    }
}

fn deadlift() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "deadlift",
        hinge_config(
            "Deadlift",
            degree_thresholds(12.0, 35.0, 0.80),
            Some(StanceVariant {
                wide_ratio: 1.8,
                wide: degree_thresholds(10.0, 25.0, 0.80),
            }),
        ),
    )
}

fn romanian_deadlift() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "romanian_deadlift",
        hinge_config(
            "Romanian Deadlift",
            degree_thresholds(12.0, 30.0, 0.85),
            None,
        ),
    )
}

fn arm_config(
    display_name: &'static str,
    thresholds: PhaseThresholds,
    calibration: CalibrationProfile,
    reference: ArmReference,
    quality: QualityTiers,
    reference_depth: f32,
    phase_names: PhaseNames,
) -> ExerciseConfig {
    ExerciseConfig {
        display_name,
        family: ExerciseFamily::ArmEndpoint {
            direction: Direction::Up,
            reference,
        },
        thresholds,
        calibration,
        motion_range: COORDINATE_MOTION,
        quality,
        reference_depth: Some(reference_depth),
        joints: JointRequirement {
            parts: vec![BodyPart::Shoulder, BodyPart::Hip],
            arm_endpoint: true,
        },
        phase_names,
    }
}

fn overhead_press() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "overhead_press",
        arm_config(
            "Overhead Press",
            inch_thresholds(3.0, 8.0, 0.80),
            CalibrationProfile {
                anatomical_ratio: TORSO_RATIO,
                reference_range: (0.08, 0.5),
                sample_tolerance: 0.15,
                setup_torso_range: None,
            },
            ArmReference::ShoulderToHip,
            QualityTiers {
                half: 10.0,
                parallel: 14.0,
                deep: 18.0,
            },
            18.0,
            PhaseNames {
                away: "pressing",
                returning: "lowering",
            },
        ),
    )
}

fn row_calibration() -> CalibrationProfile {
    CalibrationProfile {
        anatomical_ratio: ARM_RATIO,
        reference_range: (0.08, 0.55),
        sample_tolerance: 0.18,
        setup_torso_range: Some((MIN_HINGE_DEGREES, 90.0)),
    }
}

const ROW_PHASES: PhaseNames = PhaseNames {
    away: "pulling",
    returning: "lowering",
};

fn bent_over_row() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "bent_over_row",
        arm_config(
            "Bent-Over Row",
            inch_thresholds(2.0, 5.0, 0.75),
            row_calibration(),
            ArmReference::ShoulderToPoint,
            QualityTiers {
                half: 5.0,
                parallel: 8.0,
                deep: 11.0,
            },
            10.0,
            ROW_PHASES,
        ),
    )
}

fn dumbbell_row() -> ExerciseDefinition {
    ExerciseDefinition::new(
        "dumbbell_row",
        arm_config(
            "Dumbbell Row",
            inch_thresholds(2.0, 4.0, 0.75),
            row_calibration(),
            ArmReference::ShoulderToPoint,
            QualityTiers {
                half: 4.0,
                parallel: 7.0,
                deep: 10.0,
            },
            9.0,
            ROW_PHASES,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::ExerciseRegistry;

    #[test]
    fn test_every_builtin_validates() {
        let builder = register_builtin(ExerciseRegistry::builder()).unwrap();
        let registry = builder.build();
        for id in registry.ids() {
            let def = registry.get(id).unwrap();
            assert!(def.config.validate().is_ok(), "{id} failed validation");
        }
    }

    #[test]
    fn test_families_are_assigned() {
        let registry = ExerciseRegistry::with_builtin().unwrap();
        assert!(registry.get("deadlift").unwrap().config.family.is_angle_based());
        assert!(
            registry
                .get("bent_over_row")
                .unwrap()
                .config
                .family
                .tracks_arm_endpoint()
        );
        assert_eq!(
            registry.get("split_squat").unwrap().config.family.unilateral(),
            Some(UnilateralMode::SplitStance)
        );
        assert_eq!(registry.get("squat").unwrap().config.family.unilateral(), None);
    }

    #[test]
    fn test_hinge_setups_require_a_lean() {
        let registry = ExerciseRegistry::with_builtin().unwrap();
        for id in ["deadlift", "romanian_deadlift", "bent_over_row", "dumbbell_row"] {
            let (min, _) = registry
                .get(id)
                .unwrap()
                .config
                .calibration
                .setup_torso_range
                .unwrap();
            assert_eq!(min, MIN_HINGE_DEGREES, "{id}");
        }
    }

    #[test]
    fn test_strict_variants_recover_further() {
        let registry = ExerciseRegistry::with_builtin().unwrap();
        let squat = registry.get("squat").unwrap();
        let front = registry.get("front_squat").unwrap();
        assert!(front.config.thresholds.recovery_target > squat.config.thresholds.recovery_target);
    }
}
