use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named angle signals derived per frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AngleName {
    KneeAngleLeft,
    KneeAngleRight,
    HipAngleLeft,
    HipAngleRight,
    BackAngleLeft,
    BackAngleRight,
    TrunkInclination,
    TibiaInclination,
    TrunkTibiaAngle,
}

impl AngleName {
    pub const ALL: [AngleName; 9] = [
        AngleName::KneeAngleLeft,
        AngleName::KneeAngleRight,
        AngleName::HipAngleLeft,
        AngleName::HipAngleRight,
        AngleName::BackAngleLeft,
        AngleName::BackAngleRight,
        AngleName::TrunkInclination,
        AngleName::TibiaInclination,
        AngleName::TrunkTibiaAngle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AngleName::KneeAngleLeft => "knee_angle_left",
            AngleName::KneeAngleRight => "knee_angle_right",
            AngleName::HipAngleLeft => "hip_angle_left",
            AngleName::HipAngleRight => "hip_angle_right",
            AngleName::BackAngleLeft => "back_angle_left",
            AngleName::BackAngleRight => "back_angle_right",
            AngleName::TrunkInclination => "trunk_inclination",
            AngleName::TibiaInclination => "tibia_inclination",
            AngleName::TrunkTibiaAngle => "trunk_tibia_angle",
        }
    }
}

/// A joint measured on both sides of the body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Joint {
    Knee,
    Hip,
    Back,
}

impl Joint {
    pub fn sides(&self) -> (AngleName, AngleName) {
        match self {
            Joint::Knee => (AngleName::KneeAngleLeft, AngleName::KneeAngleRight),
            Joint::Hip => (AngleName::HipAngleLeft, AngleName::HipAngleRight),
            Joint::Back => (AngleName::BackAngleLeft, AngleName::BackAngleRight),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::Knee => "knee",
            Joint::Hip => "hip",
            Joint::Back => "back",
        }
    }
}

/// Mean of the valid sides, or `None` when neither side is valid.
pub fn bilateral_mean(left: Option<f32>, right: Option<f32>) -> Option<f32> {
    match (left, right) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Raw angles of one frame. `None` marks an angle whose landmarks were unusable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AngleSample {
    pub frame_index: u64,
    pub values: BTreeMap<AngleName, Option<f32>>,
    /// Knee width over ankle width; only measurable from a frontal view.
    pub knee_ankle_ratio: Option<f32>,
}

impl AngleSample {
    /// A sample where every angle is invalid.
    pub fn invalid(frame_index: u64) -> Self {
        Self {
            frame_index,
            values: AngleName::ALL.iter().map(|name| (*name, None)).collect(),
            knee_ankle_ratio: None,
        }
    }

    pub fn get(&self, name: AngleName) -> Option<f32> {
        self.values.get(&name).copied().flatten()
    }

    pub fn is_valid(&self, name: AngleName) -> bool {
        self.get(name).is_some()
    }

    pub fn joint(&self, joint: Joint) -> Option<f32> {
        let (left, right) = joint.sides();
        bilateral_mean(self.get(left), self.get(right))
    }

    pub fn valid_count(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmoothedValue {
    pub value: Option<f32>,
    /// Valid samples the value was computed from.
    pub samples: usize,
    /// Set when the raw value was passed through because history was still warming up.
    pub raw_fallback: bool,
}

impl SmoothedValue {
    pub fn invalid(samples: usize) -> Self {
        Self {
            value: None,
            samples,
            raw_fallback: false,
        }
    }
}

/// Angles of one frame filtered over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmoothedAngleSample {
    pub frame_index: u64,
    pub window: usize,
    pub values: BTreeMap<AngleName, SmoothedValue>,
}

impl SmoothedAngleSample {
    pub fn get(&self, name: AngleName) -> Option<f32> {
        self.values.get(&name).and_then(|v| v.value)
    }

    pub fn joint(&self, joint: Joint) -> Option<f32> {
        let (left, right) = joint.sides();
        bilateral_mean(self.get(left), self.get(right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilateral_mean_uses_any_valid_side() {
        assert_eq!(bilateral_mean(Some(80.0), Some(100.0)), Some(90.0));
        assert_eq!(bilateral_mean(None, Some(100.0)), Some(100.0));
        assert_eq!(bilateral_mean(None, None), None);
    }

    #[test]
    fn invalid_sample_has_every_angle_unset() {
        let sample = AngleSample::invalid(4);
        assert_eq!(sample.values.len(), AngleName::ALL.len());
        assert_eq!(sample.valid_count(), 0);
        assert_eq!(sample.joint(Joint::Knee), None);
    }
}
