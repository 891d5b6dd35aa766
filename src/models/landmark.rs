use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anatomical points the engine understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkName {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl LandmarkName {
    pub const ALL: [LandmarkName; 13] = [
        LandmarkName::Nose,
        LandmarkName::LeftShoulder,
        LandmarkName::RightShoulder,
        LandmarkName::LeftHip,
        LandmarkName::RightHip,
        LandmarkName::LeftKnee,
        LandmarkName::RightKnee,
        LandmarkName::LeftAnkle,
        LandmarkName::RightAnkle,
        LandmarkName::LeftHeel,
        LandmarkName::RightHeel,
        LandmarkName::LeftFootIndex,
        LandmarkName::RightFootIndex,
    ];

    /// Index in the 33-point BlazePose layout.
    pub fn blazepose_index(&self) -> usize {
        match self {
            LandmarkName::Nose => 0,
            LandmarkName::LeftShoulder => 11,
            LandmarkName::RightShoulder => 12,
            LandmarkName::LeftHip => 23,
            LandmarkName::RightHip => 24,
            LandmarkName::LeftKnee => 25,
            LandmarkName::RightKnee => 26,
            LandmarkName::LeftAnkle => 27,
            LandmarkName::RightAnkle => 28,
            LandmarkName::LeftHeel => 29,
            LandmarkName::RightHeel => 30,
            LandmarkName::LeftFootIndex => 31,
            LandmarkName::RightFootIndex => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LandmarkName::Nose => "nose",
            LandmarkName::LeftShoulder => "left_shoulder",
            LandmarkName::RightShoulder => "right_shoulder",
            LandmarkName::LeftHip => "left_hip",
            LandmarkName::RightHip => "right_hip",
            LandmarkName::LeftKnee => "left_knee",
            LandmarkName::RightKnee => "right_knee",
            LandmarkName::LeftAnkle => "left_ankle",
            LandmarkName::RightAnkle => "right_ankle",
            LandmarkName::LeftHeel => "left_heel",
            LandmarkName::RightHeel => "right_heel",
            LandmarkName::LeftFootIndex => "left_foot_index",
            LandmarkName::RightFootIndex => "right_foot_index",
        }
    }
}

/// One detected point. `z` is present only when the pose model estimates depth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    pub confidence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            confidence,
        }
    }

    pub fn with_depth(x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            z: Some(z),
            confidence,
        }
    }
}

/// The landmark set of a single video frame, as handed over by the pose service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameLandmarks {
    pub index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<f64>,
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkName, Landmark>,
}

impl FrameLandmarks {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            timestamp_ms: None,
            landmarks: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: LandmarkName, landmark: Landmark) -> Self {
        self.landmarks.insert(name, landmark);
        self
    }

    pub fn get(&self, name: LandmarkName) -> Option<&Landmark> {
        self.landmarks.get(&name)
    }

    /// Build a frame from the 33-point BlazePose output, one `[x, y, z, visibility]`
    /// row per landmark. Points the engine does not use are dropped; rows past
    /// the end of `points` are simply absent.
    pub fn from_blazepose(index: u64, points: &[[f32; 4]]) -> Self {
        let landmarks = LandmarkName::ALL
            .iter()
            .filter_map(|name| {
                points.get(name.blazepose_index()).map(|p| {
                    (*name, Landmark::with_depth(p[0], p[1], p[2], p[3]))
                })
            })
            .collect();

        Self {
            index,
            timestamp_ms: None,
            landmarks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blazepose_rows_map_to_names() {
        let mut points = vec![[0.0f32; 4]; 33];
        points[25] = [0.4, 0.6, -0.1, 0.9];
        let frame = FrameLandmarks::from_blazepose(7, &points);

        let knee = frame.get(LandmarkName::LeftKnee).unwrap();
        assert_eq!(frame.index, 7);
        assert_eq!(knee.x, 0.4);
        assert_eq!(knee.z, Some(-0.1));
        assert_eq!(knee.confidence, 0.9);
        assert_eq!(frame.landmarks.len(), LandmarkName::ALL.len());
    }

    #[test]
    fn truncated_blazepose_output_omits_missing_rows() {
        let points = vec![[0.5f32, 0.5, 0.0, 1.0]; 25];
        let frame = FrameLandmarks::from_blazepose(0, &points);
        assert!(frame.get(LandmarkName::LeftHip).is_some());
        assert!(frame.get(LandmarkName::LeftKnee).is_none());
    }

    #[test]
    fn frame_json_uses_named_keys() {
        let frame = FrameLandmarks::new(3).with(LandmarkName::RightAnkle, Landmark::new(0.1, 0.9, 0.8));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["landmarks"]["right_ankle"]["confidence"], 0.8f32 as f64);
        assert!(json.get("timestampMs").is_none());
    }
}
