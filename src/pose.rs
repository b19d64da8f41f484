use crate::error::Error;
use num_traits::ToPrimitive;
use ordered_float::NotNan;
use std::ops::Sub;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, num_derive::FromPrimitive, num_derive::ToPrimitive,
)]
pub(crate) enum KeypointKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointKind {
    pub(crate) fn idx(self) -> Result<usize, Error> {
        self.to_usize().ok_or(Error::KeypointVariantToUSize(self))
    }
}

pub(crate) const NUM_KEYPOINTS: usize = 17;

/// A 2D point in the canonical pose frame: pixels, origin at the top left, y
/// growing downward.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub(crate) struct Point {
    x: f32,
    y: f32,
}

impl Point {
    pub(crate) fn new(x: f32, y: f32) -> Result<Self, Error> {
        Ok(Self {
            x: NotNan::new(x)
                .map_err(|e| Error::ConstructNotNan(e, x))?
                .into_inner(),
            y: NotNan::new(y)
                .map_err(|e| Error::ConstructNotNan(e, y))?
                .into_inner(),
        })
    }

    #[inline]
    pub(crate) fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub(crate) fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub(crate) fn distance(self, other: Self) -> f32 {
        (other - self).norm()
    }

    pub(crate) fn midpoint(self, other: Self) -> Self {
        Self {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
        }
    }

    #[inline]
    pub(crate) fn x(self) -> f32 {
        self.x
    }

    #[inline]
    pub(crate) fn y(self) -> f32 {
        self.y
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::Output {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Keypoint {
    pub(crate) point: Point,
    pub(crate) score: f32,
}

impl Keypoint {
    pub(crate) fn new(x: f32, y: f32, score: f32) -> Result<Self, Error> {
        Ok(Self {
            point: Point::new(x, y)?,
            score,
        })
    }
}

pub(crate) type Keypoints = [Option<Keypoint>; NUM_KEYPOINTS];

/// One detected body in one frame. A missing entry means the detector did
/// not report that body part at all.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub(crate) struct Pose {
    keypoints: Keypoints,
}

impl Pose {
    pub(crate) fn new(keypoints: Keypoints) -> Self {
        Self { keypoints }
    }

    pub(crate) fn get(&self, kind: KeypointKind) -> Option<&Keypoint> {
        kind.idx()
            .ok()
            .and_then(|idx| self.keypoints.get(idx))
            .and_then(Option::as_ref)
    }

    /// Return a copy of this pose with `kind` set to `keypoint`.
    #[cfg(test)]
    pub(crate) fn with(mut self, kind: KeypointKind, keypoint: Keypoint) -> Result<Self, Error> {
        self.keypoints[kind.idx()?] = Some(keypoint);
        Ok(self)
    }
}

/// The bilateral pairs that asymmetry is measured over, in recorded column
/// order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum BodyPart {
    Shoulder,
    Hip,
    Knee,
    Ankle,
    Elbow,
    Wrist,
    Ear,
}

impl BodyPart {
    pub(crate) const ALL: [BodyPart; 7] = [
        BodyPart::Shoulder,
        BodyPart::Hip,
        BodyPart::Knee,
        BodyPart::Ankle,
        BodyPart::Elbow,
        BodyPart::Wrist,
        BodyPart::Ear,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Shoulder => "shoulder",
            Self::Hip => "hip",
            Self::Knee => "knee",
            Self::Ankle => "ankle",
            Self::Elbow => "elbow",
            Self::Wrist => "wrist",
            Self::Ear => "ear",
        }
    }

    pub(crate) fn keypoints(self) -> (KeypointKind, KeypointKind) {
        use KeypointKind::*;
        match self {
            Self::Shoulder => (LeftShoulder, RightShoulder),
            Self::Hip => (LeftHip, RightHip),
            Self::Knee => (LeftKnee, RightKnee),
            Self::Ankle => (LeftAnkle, RightAnkle),
            Self::Elbow => (LeftElbow, RightElbow),
            Self::Wrist => (LeftWrist, RightWrist),
            Self::Ear => (LeftEar, RightEar),
        }
    }
}

impl std::fmt::Display for BodyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::{BodyPart, Keypoint, KeypointKind, Point, Pose, NUM_KEYPOINTS};
    use assert_approx_eq::assert_approx_eq;
    use num_traits::FromPrimitive;

    #[test]
    fn keypoint_kind_round_trips_through_index() {
        for idx in 0..NUM_KEYPOINTS {
            let kind = KeypointKind::from_usize(idx).unwrap();
            assert_eq!(kind.idx().unwrap(), idx);
        }
        assert!(KeypointKind::from_usize(NUM_KEYPOINTS).is_none());
    }

    #[test]
    fn nan_point_is_rejected() {
        assert!(Point::new(f32::NAN, 1.0).is_err());
        assert!(Point::new(1.0, f32::NAN).is_err());
    }

    #[test]
    fn distance_and_midpoint() {
        let a = Point::new(0.0, 0.0).unwrap();
        let b = Point::new(3.0, 4.0).unwrap();
        assert_approx_eq!(a.distance(b), 5.0);
        let mid = a.midpoint(b);
        assert_approx_eq!(mid.x(), 1.5);
        assert_approx_eq!(mid.y(), 2.0);
    }

    #[test]
    fn missing_keypoint_is_none() {
        let pose = Pose::default()
            .with(KeypointKind::LeftHip, Keypoint::new(1.0, 2.0, 0.9).unwrap())
            .unwrap();
        assert!(pose.get(KeypointKind::LeftHip).is_some());
        assert!(pose.get(KeypointKind::RightHip).is_none());
    }

    #[test]
    fn body_parts_pair_left_with_right() {
        for part in BodyPart::ALL.iter() {
            let (left, right) = part.keypoints();
            assert_eq!(left.idx().unwrap() + 1, right.idx().unwrap());
        }
    }
}
