use crate::{
    config::VisibilityConfig,
    pose::{Keypoint, KeypointKind, Pose},
};

/// Predicates deciding whether a pose, or parts of it, can be trusted.
///
/// Two thresholds are applied: a looser one for deciding whether the user is
/// in frame at all, and a stricter one for deciding whether a keypoint is
/// good enough to derive a metric from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VisibilityGate {
    usable_confidence: f32,
    metric_confidence: f32,
}

impl VisibilityGate {
    pub(crate) fn new(config: &VisibilityConfig) -> Self {
        Self {
            usable_confidence: config.usable_confidence,
            metric_confidence: config.metric_confidence,
        }
    }

    /// Whether `keypoint` is present and confident enough to compute metrics
    /// from.
    pub(crate) fn is_keypoint_visible(&self, keypoint: Option<&Keypoint>) -> bool {
        exceeds(keypoint, self.metric_confidence)
    }

    /// Whether every keypoint in `keypoints` is visible.
    pub(crate) fn are_all_visible<'a, I>(&self, keypoints: I) -> bool
    where
        I: IntoIterator<Item = Option<&'a Keypoint>>,
    {
        keypoints
            .into_iter()
            .all(|keypoint| self.is_keypoint_visible(keypoint))
    }

    /// Whether the user is sufficiently in frame: at least one ear, one wrist
    /// and one ankle must be detected.
    pub(crate) fn is_pose_usable(&self, pose: &Pose) -> bool {
        use KeypointKind::*;

        let either = |left, right| {
            exceeds(pose.get(left), self.usable_confidence)
                || exceeds(pose.get(right), self.usable_confidence)
        };

        either(LeftEar, RightEar) && either(LeftWrist, RightWrist) && either(LeftAnkle, RightAnkle)
    }
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self::new(&VisibilityConfig::default())
    }
}

fn exceeds(keypoint: Option<&Keypoint>, threshold: f32) -> bool {
    keypoint.map_or(false, |keypoint| keypoint.score > threshold)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::VisibilityGate;
    use crate::pose::{Keypoint, KeypointKind, Pose, NUM_KEYPOINTS};

    /// A standing, front-facing pose with every keypoint at `score`.
    pub(crate) fn standing_pose(score: f32) -> Pose {
        use KeypointKind::*;

        let coords = [
            (Nose, 100.0, 40.0),
            (LeftEye, 95.0, 35.0),
            (RightEye, 105.0, 35.0),
            (LeftEar, 90.0, 38.0),
            (RightEar, 110.0, 38.0),
            (LeftShoulder, 80.0, 70.0),
            (RightShoulder, 120.0, 70.0),
            (LeftElbow, 75.0, 110.0),
            (RightElbow, 125.0, 110.0),
            (LeftWrist, 72.0, 150.0),
            (RightWrist, 128.0, 150.0),
            (LeftHip, 88.0, 170.0),
            (RightHip, 112.0, 170.0),
            (LeftKnee, 88.0, 230.0),
            (RightKnee, 112.0, 230.0),
            (LeftAnkle, 88.0, 290.0),
            (RightAnkle, 112.0, 290.0),
        ];
        assert_eq!(coords.len(), NUM_KEYPOINTS);

        coords
            .iter()
            .fold(Pose::default(), |pose, &(kind, x, y)| {
                pose.with(kind, Keypoint::new(x, y, score).unwrap()).unwrap()
            })
    }

    pub(crate) fn with_score(pose: Pose, kind: KeypointKind, score: f32) -> Pose {
        let keypoint = *pose.get(kind).unwrap();
        pose.with(kind, Keypoint { score, ..keypoint }).unwrap()
    }

    mod is_pose_usable_tests {
        use super::{standing_pose, with_score, VisibilityGate};
        use crate::pose::{KeypointKind::*, Pose};

        #[test]
        fn fully_visible_pose_is_usable() {
            assert!(VisibilityGate::default().is_pose_usable(&standing_pose(0.9)));
        }

        #[test]
        fn empty_pose_is_not_usable() {
            assert!(!VisibilityGate::default().is_pose_usable(&Pose::default()));
        }

        #[test]
        fn one_side_of_each_group_is_enough() {
            let pose = standing_pose(0.9);
            let pose = with_score(pose, LeftEar, 0.1);
            let pose = with_score(pose, RightWrist, 0.1);
            let pose = with_score(pose, LeftAnkle, 0.1);
            assert!(VisibilityGate::default().is_pose_usable(&pose));
        }

        #[test]
        fn losing_both_ankles_is_not_usable() {
            let pose = standing_pose(0.9);
            let pose = with_score(pose, LeftAnkle, 0.2);
            let pose = with_score(pose, RightAnkle, 0.5);
            assert!(!VisibilityGate::default().is_pose_usable(&pose));
        }
    }

    mod visibility_tests {
        use super::{standing_pose, VisibilityGate};
        use crate::pose::KeypointKind::*;

        #[test]
        fn threshold_is_exclusive() {
            let gate = VisibilityGate::default();
            let pose = standing_pose(0.7);
            assert!(!gate.is_keypoint_visible(pose.get(Nose)));
            let pose = standing_pose(0.71);
            assert!(gate.is_keypoint_visible(pose.get(Nose)));
        }

        #[test]
        fn missing_keypoint_is_invisible() {
            assert!(!VisibilityGate::default().is_keypoint_visible(None));
        }

        #[test]
        fn all_visible_requires_every_keypoint() {
            let gate = VisibilityGate::default();
            let pose = standing_pose(0.9);
            assert!(gate.are_all_visible(vec![pose.get(LeftHip), pose.get(LeftKnee)]));
            assert!(!gate.are_all_visible(vec![pose.get(LeftHip), None]));
        }

        #[test]
        fn usable_but_not_metric_visible() {
            let gate = VisibilityGate::default();
            let pose = standing_pose(0.6);
            assert!(gate.is_pose_usable(&pose));
            assert!(!gate.is_keypoint_visible(pose.get(LeftShoulder)));
        }
    }
}
