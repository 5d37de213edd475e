//! Per-family extraction of the phase-driving signal from a landmark frame.

use crate::{
    calibration::CalibrationSample,
    exercise::{ArmReference, ExerciseFamily},
    landmark::{BodyPart, Landmark, LandmarkFrame, Side, distance, torso_angle},
    side_lock::TrackingPointSelector,
};

/// The locked side's signal for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Image `y` or torso angle in degrees, depending on the family.
    pub signal: f32,
    /// Normalized `y` of the tracked point.
    pub position: f32,
    /// Arm endpoint in wrist coordinates, for arm families.
    pub endpoint: Option<Landmark>,
}

pub fn read(
    family: &ExerciseFamily,
    frame: &LandmarkFrame,
    side: Side,
    selector: &mut TrackingPointSelector,
    threshold: f32,
) -> Option<Reading> {
    match family {
        ExerciseFamily::Displacement { part, .. } => {
            let point = frame.part(*part, side);
            point.is_visible(threshold).then_some(Reading {
                signal: point.y,
                position: point.y,
                endpoint: None,
            })
        }
        ExerciseFamily::Hinge { .. } => {
            let shoulder = frame.part(BodyPart::Shoulder, side);
            let hip = frame.part(BodyPart::Hip, side);
            (shoulder.is_visible(threshold) && hip.is_visible(threshold)).then(|| Reading {
                signal: torso_angle(&shoulder, &hip),
                position: hip.y,
                endpoint: None,
            })
        }
        ExerciseFamily::ArmEndpoint { .. } => {
            let point = selector.select(
                frame.part(BodyPart::Wrist, side),
                frame.part(BodyPart::Elbow, side),
                threshold,
            );
            selector.corrected(point).map(|endpoint| Reading {
                signal: endpoint.y,
                position: endpoint.y,
                endpoint: Some(endpoint),
            })
        }
    }
}

pub fn calibration_sample(
    family: &ExerciseFamily,
    frame: &LandmarkFrame,
    side: Side,
    reading: &Reading,
    threshold: f32,
) -> Option<CalibrationSample> {
    let visible = |part: BodyPart| {
        let point = frame.part(part, side);
        point.is_visible(threshold).then_some(point)
    };

    let torso = visible(BodyPart::Shoulder).zip(visible(BodyPart::Hip));
    let torso_angle = torso.map(|(shoulder, hip)| torso_angle(&shoulder, &hip));
    let torso_length = torso.map(|(shoulder, hip)| distance(&shoulder, &hip));

    let reference_distance = match family {
        ExerciseFamily::Displacement {
            reference: (a, b), ..
        } => visible(*a)
            .zip(visible(*b))
            .map(|(a, b)| distance(&a, &b))?,
        ExerciseFamily::Hinge { .. }
        | ExerciseFamily::ArmEndpoint {
            reference: ArmReference::ShoulderToHip,
            ..
        } => torso_length?,
        ExerciseFamily::ArmEndpoint {
            reference: ArmReference::ShoulderToPoint,
            ..
        } => {
            let shoulder = visible(BodyPart::Shoulder)?;
            distance(&shoulder, &reading.endpoint?)
        }
    };

    let stance_ratio = match family {
        ExerciseFamily::Hinge { stance: Some(_) } => stance_ratio(frame, threshold),
        _ => None,
    };

    Some(CalibrationSample {
        position: reading.position,
        signal: reading.signal,
        reference_distance,
        torso_angle,
        stance_ratio,
    })
}

/// Away-positive displacement from `baseline`, in the exercise's ROM unit.
pub fn displacement(family: &ExerciseFamily, signal: f32, baseline: f32, scale: f32) -> f32 {
    match family {
        ExerciseFamily::Displacement { direction, .. }
        | ExerciseFamily::ArmEndpoint { direction, .. } => {
            direction.sign() * (signal - baseline) * scale
        }
        // the setup lean is the baseline; standing up shrinks the angle
        ExerciseFamily::Hinge { .. } => baseline - signal,
    }
}

/// Ankle spread relative to hip width. Needs both pairs visible and a
/// measurable hip width, which a side-on camera usually does not give.
fn stance_ratio(frame: &LandmarkFrame, threshold: f32) -> Option<f32> {
    let points = [
        frame.part(BodyPart::Hip, Side::Left),
        frame.part(BodyPart::Hip, Side::Right),
        frame.part(BodyPart::Ankle, Side::Left),
        frame.part(BodyPart::Ankle, Side::Right),
    ];
    if !points.iter().all(|p| p.is_visible(threshold)) {
        return None;
    }
    let [lh, rh, la, ra] = points;
    let hip_width = (lh.x - rh.x).abs();
    if hip_width < 1e-3 {
        return None;
    }
    Some((la.x - ra.x).abs() / hip_width)
}
