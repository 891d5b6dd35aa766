//! Joint angles and segment inclinations from a normalized landmark set.

use std::collections::BTreeMap;

use super::normalizer::{NormalizedFrame, NormalizedPoint};
use crate::models::{AngleName, AngleSample, LandmarkName};

/// Vectors shorter than this cannot define a direction.
const MIN_VECTOR_LENGTH: f32 = 1e-4;

/// Ankle separation (in reference units) needed before knee/ankle width is meaningful.
const MIN_ANKLE_WIDTH: f32 = 0.05;

/// Angle measured at `points[1]` between the segments to `points[0]` and `points[2]`.
#[derive(Debug, Clone, Copy)]
pub struct AngleDefinition {
    pub name: AngleName,
    pub points: [LandmarkName; 3],
}

pub const SQUAT_ANGLES: [AngleDefinition; 6] = [
    AngleDefinition {
        name: AngleName::KneeAngleLeft,
        points: [LandmarkName::LeftHip, LandmarkName::LeftKnee, LandmarkName::LeftAnkle],
    },
    AngleDefinition {
        name: AngleName::KneeAngleRight,
        points: [LandmarkName::RightHip, LandmarkName::RightKnee, LandmarkName::RightAnkle],
    },
    AngleDefinition {
        name: AngleName::HipAngleLeft,
        points: [LandmarkName::LeftShoulder, LandmarkName::LeftHip, LandmarkName::LeftKnee],
    },
    AngleDefinition {
        name: AngleName::HipAngleRight,
        points: [LandmarkName::RightShoulder, LandmarkName::RightHip, LandmarkName::RightKnee],
    },
    AngleDefinition {
        name: AngleName::BackAngleLeft,
        points: [LandmarkName::LeftShoulder, LandmarkName::LeftHip, LandmarkName::LeftAnkle],
    },
    AngleDefinition {
        name: AngleName::BackAngleRight,
        points: [LandmarkName::RightShoulder, LandmarkName::RightHip, LandmarkName::RightAnkle],
    },
];

type Vec3 = [f32; 3];

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: Vec3) -> f32 {
    dot(a, a).sqrt()
}

/// Angle at `b` in degrees, in [0, 180].
///
/// Uses cos(θ) = (BA · BC) / (|BA| × |BC|). Returns `None` when either segment
/// is too short to have a direction.
pub fn joint_angle(a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let ba = sub(a, b);
    let bc = sub(c, b);

    let mag_ba = norm(ba);
    let mag_bc = norm(bc);
    if mag_ba < MIN_VECTOR_LENGTH || mag_bc < MIN_VECTOR_LENGTH {
        return None;
    }

    let cos_angle = (dot(ba, bc) / (mag_ba * mag_bc)).clamp(-1.0, 1.0);
    let degrees = cos_angle.acos().to_degrees();
    degrees.is_finite().then_some(degrees)
}

/// Angle of the `lower → upper` segment from true vertical, in [0, 180].
///
/// Image y grows downward, so "up" is (0, -1).
pub fn inclination_from_vertical(lower: (f32, f32), upper: (f32, f32)) -> Option<f32> {
    let v = (upper.0 - lower.0, upper.1 - lower.1);
    let length = (v.0 * v.0 + v.1 * v.1).sqrt();
    if length < MIN_VECTOR_LENGTH {
        return None;
    }
    let cos_angle = (-v.1 / length).clamp(-1.0, 1.0);
    let degrees = cos_angle.acos().to_degrees();
    degrees.is_finite().then_some(degrees)
}

#[derive(Debug, Clone)]
pub struct AngleCalculator {
    definitions: &'static [AngleDefinition],
    use_depth: bool,
}

impl AngleCalculator {
    pub fn new(definitions: &'static [AngleDefinition], use_depth: bool) -> Self {
        Self {
            definitions,
            use_depth,
        }
    }

    pub fn compute(&self, frame: &NormalizedFrame) -> AngleSample {
        let mut values: BTreeMap<AngleName, Option<f32>> =
            AngleName::ALL.iter().map(|name| (*name, None)).collect();

        for def in self.definitions {
            values.insert(def.name, self.triplet_angle(frame, def));
        }

        let trunk = side_mean(
            segment_inclination(frame, LandmarkName::LeftHip, LandmarkName::LeftShoulder),
            segment_inclination(frame, LandmarkName::RightHip, LandmarkName::RightShoulder),
        );
        let tibia = side_mean(
            segment_inclination(frame, LandmarkName::LeftAnkle, LandmarkName::LeftKnee),
            segment_inclination(frame, LandmarkName::RightAnkle, LandmarkName::RightKnee),
        );
        let trunk_tibia = match (trunk, tibia) {
            (Some(t), Some(s)) => Some(t - s),
            _ => None,
        };
        values.insert(AngleName::TrunkInclination, trunk);
        values.insert(AngleName::TibiaInclination, tibia);
        values.insert(AngleName::TrunkTibiaAngle, trunk_tibia);

        AngleSample {
            frame_index: frame.frame_index,
            values,
            knee_ankle_ratio: knee_ankle_ratio(frame),
        }
    }

    fn triplet_angle(&self, frame: &NormalizedFrame, def: &AngleDefinition) -> Option<f32> {
        let a = frame.valid(def.points[0])?;
        let b = frame.valid(def.points[1])?;
        let c = frame.valid(def.points[2])?;

        // Depth only helps when all three points carry it.
        let with_depth = self.use_depth && a.z.is_some() && b.z.is_some() && c.z.is_some();
        joint_angle(
            to_vec3(a, with_depth),
            to_vec3(b, with_depth),
            to_vec3(c, with_depth),
        )
    }
}

fn to_vec3(p: &NormalizedPoint, with_depth: bool) -> Vec3 {
    let z = if with_depth { p.z.unwrap_or(0.0) } else { 0.0 };
    [p.x, p.y, z]
}

fn segment_inclination(frame: &NormalizedFrame, lower: LandmarkName, upper: LandmarkName) -> Option<f32> {
    let lo = frame.valid(lower)?;
    let up = frame.valid(upper)?;
    inclination_from_vertical((lo.x, lo.y), (up.x, up.y))
}

fn side_mean(left: Option<f32>, right: Option<f32>) -> Option<f32> {
    crate::models::bilateral_mean(left, right)
}

fn knee_ankle_ratio(frame: &NormalizedFrame) -> Option<f32> {
    let lk = frame.valid(LandmarkName::LeftKnee)?;
    let rk = frame.valid(LandmarkName::RightKnee)?;
    let la = frame.valid(LandmarkName::LeftAnkle)?;
    let ra = frame.valid(LandmarkName::RightAnkle)?;

    let ankle_width = (la.x - ra.x).abs();
    if ankle_width < MIN_ANKLE_WIDTH {
        return None;
    }
    Some((lk.x - rk.x).abs() / ankle_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{FrameLandmarks, Landmark};
    use crate::pose::normalizer::LandmarkNormalizer;
    use crate::profile::SQUAT;

    fn calculator() -> AngleCalculator {
        AngleCalculator::new(&SQUAT_ANGLES, true)
    }

    fn normalize(frame: &FrameLandmarks) -> NormalizedFrame {
        LandmarkNormalizer::new(&EngineConfig::default(), SQUAT.required_landmarks)
            .normalize(frame)
            .unwrap()
    }

    /// Side view, both sides overlapping, lifter facing +x.
    fn side_view(hip: (f32, f32), knee: (f32, f32), ankle: (f32, f32), shoulder: (f32, f32)) -> FrameLandmarks {
        let mut frame = FrameLandmarks::new(0);
        for (l, r, p) in [
            (LandmarkName::LeftShoulder, LandmarkName::RightShoulder, shoulder),
            (LandmarkName::LeftHip, LandmarkName::RightHip, hip),
            (LandmarkName::LeftKnee, LandmarkName::RightKnee, knee),
            (LandmarkName::LeftAnkle, LandmarkName::RightAnkle, ankle),
        ] {
            frame = frame
                .with(l, Landmark::new(p.0, p.1, 0.9))
                .with(r, Landmark::new(p.0, p.1, 0.9));
        }
        frame
    }

    #[test]
    fn straight_leg_is_180() {
        let angle = joint_angle([0.0, 0.0, 0.0], [0.0, 0.5, 0.0], [0.0, 1.0, 0.0]).unwrap();
        assert!((angle - 180.0).abs() < 0.01);
    }

    #[test]
    fn right_angle_is_90() {
        let angle = joint_angle([0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [0.5, 0.5, 0.0]).unwrap();
        assert!((angle - 90.0).abs() < 0.01);
    }

    #[test]
    fn degenerate_triplets_are_invalid() {
        assert_eq!(joint_angle([0.3, 0.3, 0.0], [0.3, 0.3, 0.0], [0.9, 0.1, 0.0]), None);
        assert_eq!(joint_angle([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 0.0]), None);
    }

    #[test]
    fn angles_stay_in_range_for_arbitrary_points() {
        let coords = [-1.5f32, -0.2, 0.0, 0.37, 1.0, 2.4];
        for &ax in &coords {
            for &by in &coords {
                for &cz in &coords {
                    if let Some(angle) = joint_angle([ax, by, 0.1], [by, cz, 0.0], [cz, ax, -0.2]) {
                        assert!((0.0..=180.0).contains(&angle), "angle {angle} out of range");
                    }
                }
            }
        }
    }

    #[test]
    fn inclination_measures_from_upright() {
        assert!(inclination_from_vertical((0.0, 1.0), (0.0, 0.0)).unwrap().abs() < 0.01);
        let leaning = inclination_from_vertical((0.0, 1.0), (1.0, 0.0)).unwrap();
        assert!((leaning - 45.0).abs() < 0.01);
        assert_eq!(inclination_from_vertical((0.2, 0.2), (0.2, 0.2)), None);
    }

    #[test]
    fn standing_pose_gives_straight_joints() {
        let frame = side_view((0.5, 0.5), (0.5, 0.7), (0.5, 0.9), (0.5, 0.2));
        let sample = calculator().compute(&normalize(&frame));

        assert!((sample.get(AngleName::KneeAngleLeft).unwrap() - 180.0).abs() < 0.1);
        assert!((sample.get(AngleName::HipAngleRight).unwrap() - 180.0).abs() < 0.1);
        assert!(sample.get(AngleName::TrunkTibiaAngle).unwrap().abs() < 0.1);
        // Side view: ankles overlap, so knee/ankle width is not measurable.
        assert_eq!(sample.knee_ankle_ratio, None);
    }

    #[test]
    fn trunk_tibia_is_trunk_minus_tibia() {
        // Shin leaning 45° forward, torso leaning ~26.6° forward.
        let frame = side_view((0.3, 0.6), (0.5, 0.6), (0.3, 0.8), (0.4, 0.4));
        let sample = calculator().compute(&normalize(&frame));

        let trunk = sample.get(AngleName::TrunkInclination).unwrap();
        let tibia = sample.get(AngleName::TibiaInclination).unwrap();
        assert!((tibia - 45.0).abs() < 0.1);
        assert!((trunk - 26.565).abs() < 0.1);
        assert!((sample.get(AngleName::TrunkTibiaAngle).unwrap() - (trunk - tibia)).abs() < 1e-4);
        assert!((sample.get(AngleName::KneeAngleLeft).unwrap() - 45.0).abs() < 0.1);
    }

    #[test]
    fn invalid_landmark_invalidates_only_dependent_angles() {
        let mut frame = side_view((0.5, 0.5), (0.55, 0.7), (0.5, 0.9), (0.5, 0.2));
        frame.landmarks.get_mut(&LandmarkName::LeftShoulder).unwrap().confidence = 0.1;
        let sample = calculator().compute(&normalize(&frame));

        assert_eq!(sample.get(AngleName::HipAngleLeft), None);
        assert_eq!(sample.get(AngleName::BackAngleLeft), None);
        assert!(sample.get(AngleName::KneeAngleLeft).is_some());
        assert!(sample.get(AngleName::HipAngleRight).is_some());
    }

    #[test]
    fn frontal_view_reports_knee_ankle_ratio() {
        let frame = FrameLandmarks::new(0)
            .with(LandmarkName::LeftShoulder, Landmark::new(0.40, 0.2, 0.9))
            .with(LandmarkName::RightShoulder, Landmark::new(0.60, 0.2, 0.9))
            .with(LandmarkName::LeftHip, Landmark::new(0.42, 0.5, 0.9))
            .with(LandmarkName::RightHip, Landmark::new(0.58, 0.5, 0.9))
            .with(LandmarkName::LeftKnee, Landmark::new(0.46, 0.7, 0.9))
            .with(LandmarkName::RightKnee, Landmark::new(0.54, 0.7, 0.9))
            .with(LandmarkName::LeftAnkle, Landmark::new(0.40, 0.9, 0.9))
            .with(LandmarkName::RightAnkle, Landmark::new(0.60, 0.9, 0.9));
        let sample = calculator().compute(&normalize(&frame));

        let ratio = sample.knee_ankle_ratio.unwrap();
        assert!((ratio - 0.4).abs() < 1e-3);
    }

    #[test]
    fn depth_is_used_when_present_on_all_points() {
        let frame = FrameLandmarks::new(0)
            .with(LandmarkName::LeftShoulder, Landmark::with_depth(0.5, 0.2, 0.0, 0.9))
            .with(LandmarkName::LeftHip, Landmark::with_depth(0.5, 0.5, 0.0, 0.9))
            .with(LandmarkName::LeftKnee, Landmark::with_depth(0.5, 0.7, 0.0, 0.9))
            .with(LandmarkName::LeftAnkle, Landmark::with_depth(0.5, 0.7, 0.2, 0.9));

        let with_depth = AngleCalculator::new(&SQUAT_ANGLES, true).compute(&normalize(&frame));
        let flat = AngleCalculator::new(&SQUAT_ANGLES, false).compute(&normalize(&frame));

        assert!((with_depth.get(AngleName::KneeAngleLeft).unwrap() - 90.0).abs() < 0.1);
        // Without depth the ankle collapses onto the knee.
        assert_eq!(flat.get(AngleName::KneeAngleLeft), None);
    }
}
