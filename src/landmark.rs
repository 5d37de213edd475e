use std::time::Instant;

/// Number of points in a MediaPipe Pose landmark frame.
pub const JOINT_COUNT: usize = 33;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// MediaPipe Pose indices for the joints the engine reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Joint {
    Nose = 0,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
}

impl Joint {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A mirrored joint pair, resolved to a concrete [`Joint`] once a side is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Shoulder,
    Elbow,
    Wrist,
    Hip,
    Knee,
    Ankle,
}

impl BodyPart {
    pub fn on(self, side: Side) -> Joint {
        match (self, side) {
            (BodyPart::Shoulder, Side::Left) => Joint::LeftShoulder,
            (BodyPart::Shoulder, Side::Right) => Joint::RightShoulder,
            (BodyPart::Elbow, Side::Left) => Joint::LeftElbow,
            (BodyPart::Elbow, Side::Right) => Joint::RightElbow,
            (BodyPart::Wrist, Side::Left) => Joint::LeftWrist,
            (BodyPart::Wrist, Side::Right) => Joint::RightWrist,
            (BodyPart::Hip, Side::Left) => Joint::LeftHip,
            (BodyPart::Hip, Side::Right) => Joint::RightHip,
            (BodyPart::Knee, Side::Left) => Joint::LeftKnee,
            (BodyPart::Knee, Side::Right) => Joint::RightKnee,
            (BodyPart::Ankle, Side::Left) => Joint::LeftAnkle,
            (BodyPart::Ankle, Side::Right) => Joint::RightAnkle,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BodyPart::Shoulder => "shoulder",
            BodyPart::Elbow => "elbow",
            BodyPart::Wrist => "wrist",
            BodyPart::Hip => "hip",
            BodyPart::Knee => "knee",
            BodyPart::Ankle => "ankle",
        }
    }
}

/// Camera-normalized joint estimate. `y` grows downwards.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }
}

#[derive(Clone, Debug)]
pub struct LandmarkFrame {
    pub landmarks: Vec<Landmark>,
    pub timestamp: Instant,
}

impl LandmarkFrame {
    pub fn new(landmarks: Vec<Landmark>, timestamp: Instant) -> Self {
        Self {
            landmarks,
            timestamp,
        }
    }

    /// Missing entries read as a fully invisible landmark rather than an error.
    pub fn get(&self, joint: Joint) -> Landmark {
        self.landmarks
            .get(joint.index())
            .copied()
            .unwrap_or_default()
    }

    pub fn part(&self, part: BodyPart, side: Side) -> Landmark {
        self.get(part.on(side))
    }
}

pub fn distance(a: &Landmark, b: &Landmark) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Angle of the hip→shoulder segment from vertical, in degrees.
/// 0 is upright, 90 is a horizontal torso.
pub fn torso_angle(shoulder: &Landmark, hip: &Landmark) -> f32 {
    let dx = (shoulder.x - hip.x).abs();
    let rise = hip.y - shoulder.y;
    dx.atan2(rise).to_degrees()
}

/// Interior angle at `b` formed by `a-b-c`, in degrees.
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let v1 = (a.x - b.x, a.y - b.y);
    let v2 = (c.x - b.x, c.y - b.y);
    let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if mag1 < 1e-4 || mag2 < 1e-4 {
        return 180.0;
    }
    let cos = ((v1.0 * v2.0 + v1.1 * v2.1) / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(x: f32, y: f32) -> Landmark {
        Landmark::new(x, y, 0.0, 0.9)
    }

    #[test]
    fn test_body_part_resolves_mirror_pairs() {
        assert_eq!(BodyPart::Hip.on(Side::Left), Joint::LeftHip);
        assert_eq!(BodyPart::Wrist.on(Side::Right), Joint::RightWrist);
        assert_eq!(Joint::LeftHip.index(), 23);
        assert_eq!(Joint::RightAnkle.index(), 28);
    }

    #[test]
    fn test_missing_landmark_is_invisible() {
        let frame = LandmarkFrame::new(vec![lm(0.5, 0.5); 12], Instant::now());
        assert!(frame.get(Joint::LeftShoulder).is_visible(0.4));
        assert!(!frame.get(Joint::LeftHip).is_visible(0.0));
    }

    #[test]
    fn test_visibility_threshold_is_exclusive() {
        let point = Landmark::new(0.0, 0.0, 0.0, 0.4);
        assert!(!point.is_visible(0.4));
        assert!(point.is_visible(0.39));
    }

    #[test]
    fn test_torso_angle() {
        let hip = lm(0.5, 0.6);
        assert!(torso_angle(&lm(0.5, 0.3), &hip).abs() < 1e-3);
        assert!((torso_angle(&lm(0.8, 0.6), &hip) - 90.0).abs() < 1e-3);
        assert!((torso_angle(&lm(0.3, 0.4), &hip) - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_joint_angle() {
        let straight = joint_angle(&lm(0.0, 0.0), &lm(0.5, 0.0), &lm(1.0, 0.0));
        assert!((straight - 180.0).abs() < 0.5);
        let bent = joint_angle(&lm(0.0, 0.0), &lm(0.5, 0.0), &lm(0.5, 0.5));
        assert!((bent - 90.0).abs() < 0.5);
    }
}
