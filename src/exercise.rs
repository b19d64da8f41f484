use crate::error::Error;
use std::{fmt, str::FromStr};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ExerciseType {
    Pose,
    Squat,
    HandRise,
    SideSquat,
    Plank,
}

/// Which way the user faces the camera, and therefore which metric is
/// meaningful for an exercise.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Orientation {
    /// Facing the camera: bilateral asymmetry is measured.
    Front,
    /// Side-on to the camera: a single joint angle is measured.
    Side,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum AngleType {
    /// Knee angle formed by hip, knee and ankle.
    Squat,
    /// Hip angle formed by shoulder, hip and ankle.
    Plank,
}

impl AngleType {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Squat => "squat_angle",
            Self::Plank => "plank_angle",
        }
    }
}

impl fmt::Display for AngleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Squat => "squat",
            Self::Plank => "plank",
        })
    }
}

impl ExerciseType {
    pub(crate) const ALL: [ExerciseType; 5] = [
        ExerciseType::Pose,
        ExerciseType::Squat,
        ExerciseType::HandRise,
        ExerciseType::SideSquat,
        ExerciseType::Plank,
    ];

    pub(crate) fn orientation(self) -> Orientation {
        match self {
            Self::Pose | Self::Squat | Self::HandRise => Orientation::Front,
            Self::SideSquat | Self::Plank => Orientation::Side,
        }
    }

    /// The one angle column populated for side-view exercises.
    pub(crate) fn angle_type(self) -> Option<AngleType> {
        match self {
            Self::SideSquat => Some(AngleType::Squat),
            Self::Plank => Some(AngleType::Plank),
            Self::Pose | Self::Squat | Self::HandRise => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pose => "POSE",
            Self::Squat => "SQUAT",
            Self::HandRise => "HAND_RISE",
            Self::SideSquat => "SIDE_SQUAT",
            Self::Plank => "PLANK",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|exercise| exercise.as_str() == normalized)
            .ok_or_else(|| Error::ParseExerciseType(s.to_owned()))
    }
}
