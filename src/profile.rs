//! Per-exercise tables: which landmarks matter, which angles to derive and
//! which rules to score. Adding an exercise means adding a profile here; the
//! segmenter and evaluator stay untouched.

use crate::evaluation::rules::{RuleSpec, SQUAT_RULES};
use crate::models::{Exercise, LandmarkName};
use crate::pose::angles::{AngleDefinition, SQUAT_ANGLES};

pub struct ExerciseProfile {
    pub exercise: Exercise,
    /// Landmarks counted by the normalizer's minimum-valid check.
    pub required_landmarks: &'static [LandmarkName],
    pub angles: &'static [AngleDefinition],
    /// Ordered by priority.
    pub rules: &'static [RuleSpec],
}

const SQUAT_LANDMARKS: [LandmarkName; 8] = [
    LandmarkName::LeftShoulder,
    LandmarkName::RightShoulder,
    LandmarkName::LeftHip,
    LandmarkName::RightHip,
    LandmarkName::LeftKnee,
    LandmarkName::RightKnee,
    LandmarkName::LeftAnkle,
    LandmarkName::RightAnkle,
];

pub static SQUAT: ExerciseProfile = ExerciseProfile {
    exercise: Exercise::Squat,
    required_landmarks: &SQUAT_LANDMARKS,
    angles: &SQUAT_ANGLES,
    rules: &SQUAT_RULES,
};

impl ExerciseProfile {
    pub fn for_exercise(exercise: Exercise) -> &'static ExerciseProfile {
        match exercise {
            Exercise::Squat => &SQUAT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squat_rules_are_in_priority_order() {
        let priorities: Vec<u8> = SQUAT.rules.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
    }
}
