use crate::{
    exercise::{AngleType, ExerciseType, Orientation},
    pose::{BodyPart, Keypoint, KeypointKind, Point, Pose},
    visibility::VisibilityGate,
};
use tracing::warn;

/// Scale used when no meaningful body length could be measured.
pub(crate) const FALLBACK_SCALE: f64 = 1.0;

/// Angle in degrees at vertex `b` between the rays `b -> a` and `b -> c`.
///
/// Returns `None` if any point is missing or if either ray has zero length.
pub(crate) fn angle_at(a: Option<Point>, b: Option<Point>, c: Option<Point>) -> Option<f64> {
    let (a, b, c) = (a?, b?, c?);
    let ba = a - b;
    let bc = c - b;

    let norms = f64::from(ba.norm()) * f64::from(bc.norm());
    if norms == 0.0 {
        return None;
    }

    let cosine = (f64::from(ba.dot(bc)) / norms).clamp(-1.0, 1.0);
    Some(cosine.acos().to_degrees())
}

/// Vertical offset between a left/right pair as a percentage of `scale`.
pub(crate) fn bilateral_asymmetry(
    gate: &VisibilityGate,
    left: Option<&Keypoint>,
    right: Option<&Keypoint>,
    scale: f64,
) -> Option<f64> {
    if !gate.are_all_visible(vec![left, right]) {
        return None;
    }
    let (left, right) = (left?, right?);
    let dy = f64::from(left.point.y()) - f64::from(right.point.y());
    Some(dy.abs() / scale * 100.0)
}

/// Distance from the mid-shoulder point to the mid-hip point, or
/// [`FALLBACK_SCALE`] if that cannot be measured or is smaller than
/// `min_scale`.
pub(crate) fn normalization_scale(gate: &VisibilityGate, pose: &Pose, min_scale: f32) -> f64 {
    use KeypointKind::*;

    let torso = [LeftShoulder, RightShoulder, LeftHip, RightHip];
    if !gate.are_all_visible(torso.iter().map(|&kind| pose.get(kind))) {
        warn!(message = "torso not visible, using fallback scale");
        return FALLBACK_SCALE;
    }

    let point = |kind| pose.get(kind).map(|keypoint| keypoint.point);
    let scale = match (
        point(LeftShoulder),
        point(RightShoulder),
        point(LeftHip),
        point(RightHip),
    ) {
        (Some(ls), Some(rs), Some(lh), Some(rh)) => ls.midpoint(rs).distance(lh.midpoint(rh)),
        _ => return FALLBACK_SCALE,
    };

    if scale < min_scale {
        warn!(
            message = "normalization scale below minimum, using fallback",
            scale,
            min_scale
        );
        FALLBACK_SCALE
    } else {
        f64::from(scale)
    }
}

/// Raw positions of one bilateral pair, as recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct PairCoordinates {
    pub(crate) left: Option<Point>,
    pub(crate) right: Option<Point>,
}

/// Metrics derived from one accepted frame. `None` is recorded as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MetricRow {
    pub(crate) timestamp_ms: i64,
    pub(crate) exercise: ExerciseType,
    pub(crate) asymmetry: [Option<f64>; 7],
    pub(crate) squat_angle: Option<f64>,
    pub(crate) plank_angle: Option<f64>,
    pub(crate) coordinates: [PairCoordinates; 7],
}

impl MetricRow {
    pub(crate) fn angle(&self, angle_type: AngleType) -> Option<f64> {
        match angle_type {
            AngleType::Squat => self.squat_angle,
            AngleType::Plank => self.plank_angle,
        }
    }
}

/// Computes [`MetricRow`]s for one session, with the normalization scale
/// frozen at construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MetricEngine {
    gate: VisibilityGate,
    exercise: ExerciseType,
    scale: f64,
}

impl MetricEngine {
    pub(crate) fn new(gate: VisibilityGate, exercise: ExerciseType, scale: f64) -> Self {
        Self {
            gate,
            exercise,
            scale,
        }
    }

    pub(crate) fn scale(&self) -> f64 {
        self.scale
    }

    pub(crate) fn compute(&self, timestamp_ms: i64, pose: &Pose) -> MetricRow {
        let mut asymmetry = [None; 7];
        let mut coordinates = [PairCoordinates::default(); 7];

        for (i, part) in BodyPart::ALL.iter().enumerate() {
            let (left, right) = part.keypoints();
            let (left, right) = (pose.get(left), pose.get(right));

            coordinates[i] = PairCoordinates {
                left: left.map(|keypoint| keypoint.point),
                right: right.map(|keypoint| keypoint.point),
            };

            if self.exercise.orientation() == Orientation::Front {
                asymmetry[i] = bilateral_asymmetry(&self.gate, left, right, self.scale);
            }
        }

        let angle = self
            .exercise
            .angle_type()
            .and_then(|angle_type| self.side_angle(pose, angle_type));

        MetricRow {
            timestamp_ms,
            exercise: self.exercise,
            asymmetry,
            squat_angle: angle.filter(|_| self.exercise.angle_type() == Some(AngleType::Squat)),
            plank_angle: angle.filter(|_| self.exercise.angle_type() == Some(AngleType::Plank)),
            coordinates,
        }
    }

    /// Compute `angle_type` on the left side if it is fully visible,
    /// otherwise on the right side. Only the first visible side is measured.
    fn side_angle(&self, pose: &Pose, angle_type: AngleType) -> Option<f64> {
        use KeypointKind::*;

        let sides = match angle_type {
            AngleType::Squat => [(LeftHip, LeftKnee, LeftAnkle), (RightHip, RightKnee, RightAnkle)],
            AngleType::Plank => [
                (LeftShoulder, LeftHip, LeftAnkle),
                (RightShoulder, RightHip, RightAnkle),
            ],
        };

        let point = |kind| pose.get(kind);
        let (a, b, c) = sides
            .iter()
            .map(|&(a, b, c)| (point(a), point(b), point(c)))
            .find(|&(a, b, c)| self.gate.are_all_visible(vec![a, b, c]))?;
        angle_at(
            a.map(|keypoint| keypoint.point),
            b.map(|keypoint| keypoint.point),
            c.map(|keypoint| keypoint.point),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::pose::Point;

    fn p(x: f32, y: f32) -> Option<Point> {
        Some(Point::new(x, y).unwrap())
    }

    mod angle_at_tests {
        use super::p;
        use crate::metrics::angle_at;
        use assert_approx_eq::assert_approx_eq;

        #[test]
        fn right_angle() {
            assert_approx_eq!(angle_at(p(1.0, 0.0), p(0.0, 0.0), p(0.0, 1.0)).unwrap(), 90.0);
        }

        #[test]
        fn straight_line() {
            assert_approx_eq!(angle_at(p(-2.0, 0.0), p(0.0, 0.0), p(5.0, 0.0)).unwrap(), 180.0);
        }

        #[test]
        fn symmetric_under_swapping_ends() {
            let (a, b, c) = (p(3.0, 7.0), p(1.5, -2.0), p(-4.0, 0.25));
            assert_approx_eq!(angle_at(a, b, c).unwrap(), angle_at(c, b, a).unwrap());
        }

        #[test]
        fn collinear_same_direction_does_not_produce_nan() {
            let angle = angle_at(p(1.0, 1.0), p(0.0, 0.0), p(3.0, 3.0)).unwrap();
            assert!(!angle.is_nan());
            assert_approx_eq!(angle, 0.0, 1e-3);
        }

        #[test]
        fn coincident_points_are_degenerate() {
            assert!(angle_at(p(0.0, 0.0), p(0.0, 0.0), p(0.0, 1.0)).is_none());
            assert!(angle_at(p(1.0, 0.0), p(0.0, 0.0), p(0.0, 0.0)).is_none());
        }

        #[test]
        fn missing_point_is_none() {
            assert!(angle_at(None, p(0.0, 0.0), p(0.0, 1.0)).is_none());
            assert!(angle_at(p(1.0, 0.0), None, p(0.0, 1.0)).is_none());
        }
    }

    mod bilateral_asymmetry_tests {
        use crate::{metrics::bilateral_asymmetry, pose::Keypoint, visibility::VisibilityGate};
        use assert_approx_eq::assert_approx_eq;

        #[test]
        fn percentage_of_scale() {
            let left = Keypoint::new(0.0, 100.0, 0.9).unwrap();
            let right = Keypoint::new(0.0, 90.0, 0.9).unwrap();
            let value =
                bilateral_asymmetry(&VisibilityGate::default(), Some(&left), Some(&right), 50.0);
            assert_approx_eq!(value.unwrap(), 20.0);
        }

        #[test]
        fn order_does_not_matter() {
            let gate = VisibilityGate::default();
            let left = Keypoint::new(0.0, 90.0, 0.9).unwrap();
            let right = Keypoint::new(0.0, 100.0, 0.9).unwrap();
            assert_approx_eq!(
                bilateral_asymmetry(&gate, Some(&left), Some(&right), 50.0).unwrap(),
                bilateral_asymmetry(&gate, Some(&right), Some(&left), 50.0).unwrap()
            );
        }

        #[test]
        fn low_confidence_is_none() {
            let left = Keypoint::new(0.0, 100.0, 0.9).unwrap();
            let right = Keypoint::new(0.0, 90.0, 0.3).unwrap();
            let gate = VisibilityGate::default();
            assert!(bilateral_asymmetry(&gate, Some(&left), Some(&right), 50.0).is_none());
            assert!(bilateral_asymmetry(&gate, Some(&left), None, 50.0).is_none());
        }
    }

    mod normalization_scale_tests {
        use crate::{
            metrics::{normalization_scale, FALLBACK_SCALE},
            pose::Pose,
            visibility::{tests::standing_pose, VisibilityGate},
        };
        use assert_approx_eq::assert_approx_eq;

        #[test]
        fn mid_shoulder_to_mid_hip() {
            // shoulders at y = 70, hips at y = 170, both centered on x = 100
            let scale = normalization_scale(&VisibilityGate::default(), &standing_pose(0.9), 10.0);
            assert_approx_eq!(scale, 100.0);
        }

        #[test]
        fn tiny_torso_falls_back() {
            let scale =
                normalization_scale(&VisibilityGate::default(), &standing_pose(0.9), 500.0);
            assert_approx_eq!(scale, FALLBACK_SCALE);
        }

        #[test]
        fn invisible_torso_falls_back() {
            let scale = normalization_scale(&VisibilityGate::default(), &Pose::default(), 10.0);
            assert_approx_eq!(scale, FALLBACK_SCALE);
        }
    }

    mod metric_engine_tests {
        use crate::{
            exercise::ExerciseType,
            metrics::MetricEngine,
            pose::{Keypoint, KeypointKind::*},
            visibility::{
                tests::{standing_pose, with_score},
                VisibilityGate,
            },
        };
        use assert_approx_eq::assert_approx_eq;

        #[test]
        fn front_view_fills_asymmetry_and_no_angles() {
            let pose = standing_pose(0.9)
                .with(LeftShoulder, Keypoint::new(80.0, 80.0, 0.9).unwrap())
                .unwrap();
            let engine = MetricEngine::new(VisibilityGate::default(), ExerciseType::Squat, 100.0);
            let row = engine.compute(7, &pose);

            assert_eq!(row.timestamp_ms, 7);
            assert_approx_eq!(row.asymmetry[0].unwrap(), 10.0);
            assert_approx_eq!(row.asymmetry[1].unwrap(), 0.0);
            assert!(row.squat_angle.is_none());
            assert!(row.plank_angle.is_none());
            assert_approx_eq!(row.coordinates[0].left.unwrap().y(), 80.0);
        }

        #[test]
        fn invisible_pair_is_none_but_keeps_coordinates() {
            let pose = with_score(standing_pose(0.9), RightEar, 0.1);
            let engine = MetricEngine::new(VisibilityGate::default(), ExerciseType::Pose, 100.0);
            let row = engine.compute(0, &pose);
            assert!(row.asymmetry[6].is_none());
            assert!(row.coordinates[6].right.is_some());
        }

        #[test]
        fn side_squat_only_fills_squat_angle() {
            let engine =
                MetricEngine::new(VisibilityGate::default(), ExerciseType::SideSquat, 1.0);
            let row = engine.compute(0, &standing_pose(0.9));
            assert_approx_eq!(row.squat_angle.unwrap(), 180.0);
            assert!(row.plank_angle.is_none());
            assert!(row.asymmetry.iter().all(Option::is_none));
        }

        #[test]
        fn plank_falls_back_to_right_side() {
            let pose = with_score(standing_pose(0.9), LeftHip, 0.1);
            let pose = pose
                .with(RightAnkle, Keypoint::new(212.0, 170.0, 0.9).unwrap())
                .unwrap();
            let engine = MetricEngine::new(VisibilityGate::default(), ExerciseType::Plank, 1.0);
            let row = engine.compute(0, &pose);
            // right shoulder (120, 70), hip (112, 170), ankle (212, 170)
            let expected = crate::metrics::angle_at(
                pose.get(RightShoulder).map(|k| k.point),
                pose.get(RightHip).map(|k| k.point),
                pose.get(RightAnkle).map(|k| k.point),
            )
            .unwrap();
            assert_approx_eq!(row.plank_angle.unwrap(), expected);
            assert!(row.squat_angle.is_none());
        }

        #[test]
        fn neither_side_visible_is_none() {
            let pose = with_score(standing_pose(0.9), LeftKnee, 0.1);
            let pose = with_score(pose, RightKnee, 0.1);
            let engine =
                MetricEngine::new(VisibilityGate::default(), ExerciseType::SideSquat, 1.0);
            assert!(engine.compute(0, &pose).squat_angle.is_none());
        }

        #[test]
        fn degenerate_left_side_does_not_fall_back() {
            // left knee on top of the left hip, right side intact
            let pose = standing_pose(0.9)
                .with(LeftKnee, Keypoint::new(88.0, 170.0, 0.9).unwrap())
                .unwrap();
            let engine =
                MetricEngine::new(VisibilityGate::default(), ExerciseType::SideSquat, 1.0);
            assert!(engine.compute(0, &pose).squat_angle.is_none());
        }
    }
}
