//! Confidence gating and scale normalization of raw landmark sets.
//!
//! Low-confidence points are kept but flagged invalid so later stages can
//! tell "unusable" apart from "at the origin". Coordinates are re-expressed
//! relative to the hip midpoint in units of a body reference length, which
//! makes every downstream angle independent of resolution and camera distance.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::{FrameLandmarks, LandmarkName};

const REFERENCE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
    pub valid: bool,
}

/// Body length the coordinates were divided by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceKind {
    /// Shoulder midpoint to hip midpoint.
    Torso,
    /// Hip midpoint to ankle midpoint.
    Leg,
    /// Diagonal of the bounding box of all valid points.
    BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFrame {
    pub frame_index: u64,
    pub points: BTreeMap<LandmarkName, NormalizedPoint>,
    pub reference: f32,
    pub reference_kind: ReferenceKind,
}

impl NormalizedFrame {
    /// The point if present and above the confidence threshold.
    pub fn valid(&self, name: LandmarkName) -> Option<&NormalizedPoint> {
        self.points.get(&name).filter(|p| p.valid)
    }
}

/// Not enough usable landmarks in a frame to compute anything.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("frame {frame_index}: {valid} of {required} required landmarks valid")]
pub struct InsufficientLandmarks {
    pub frame_index: u64,
    pub valid: usize,
    pub required: usize,
}

/// Reject frames that are structurally broken, as opposed to merely low-confidence.
pub fn validate_frame(frame: &FrameLandmarks) -> Result<(), EngineError> {
    for (name, landmark) in &frame.landmarks {
        let finite = landmark.x.is_finite()
            && landmark.y.is_finite()
            && landmark.z.map_or(true, f32::is_finite);
        if !finite {
            return Err(EngineError::MalformedLandmarkSet {
                frame_index: frame.index,
                reason: format!("{} has a non-finite coordinate", name.as_str()),
            });
        }
        if !(0.0..=1.0).contains(&landmark.confidence) {
            return Err(EngineError::MalformedLandmarkSet {
                frame_index: frame.index,
                reason: format!(
                    "{} confidence {} outside [0, 1]",
                    name.as_str(),
                    landmark.confidence
                ),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LandmarkNormalizer {
    min_confidence: f32,
    min_valid: usize,
    required: &'static [LandmarkName],
}

impl LandmarkNormalizer {
    pub fn new(config: &EngineConfig, required: &'static [LandmarkName]) -> Self {
        Self {
            min_confidence: config.min_confidence,
            min_valid: config.min_valid_landmarks.min(required.len()),
            required,
        }
    }

    pub fn normalize(&self, frame: &FrameLandmarks) -> Result<NormalizedFrame, InsufficientLandmarks> {
        let insufficient = |valid: usize| InsufficientLandmarks {
            frame_index: frame.index,
            valid,
            required: self.min_valid,
        };

        let gated: BTreeMap<LandmarkName, NormalizedPoint> = frame
            .landmarks
            .iter()
            .map(|(name, lm)| {
                (
                    *name,
                    NormalizedPoint {
                        x: lm.x,
                        y: lm.y,
                        z: lm.z,
                        valid: lm.confidence >= self.min_confidence,
                    },
                )
            })
            .collect();

        let valid_required = self
            .required
            .iter()
            .filter(|name| gated.get(*name).map_or(false, |p| p.valid))
            .count();
        if valid_required < self.min_valid {
            return Err(insufficient(valid_required));
        }

        let valid_of = |name: LandmarkName| gated.get(&name).filter(|p| p.valid);
        let shoulders = midpoint(valid_of(LandmarkName::LeftShoulder), valid_of(LandmarkName::RightShoulder));
        let hips = midpoint(valid_of(LandmarkName::LeftHip), valid_of(LandmarkName::RightHip));
        let ankles = midpoint(valid_of(LandmarkName::LeftAnkle), valid_of(LandmarkName::RightAnkle));

        let (reference, reference_kind) = reference_length(shoulders, hips, ankles, &gated)
            .ok_or_else(|| insufficient(valid_required))?;

        let origin = hips.or_else(|| centroid(&gated)).unwrap_or((0.0, 0.0, None));

        let points = gated
            .into_iter()
            .map(|(name, p)| {
                let z = p.z.map(|z| (z - origin.2.unwrap_or(0.0)) / reference);
                (
                    name,
                    NormalizedPoint {
                        x: (p.x - origin.0) / reference,
                        y: (p.y - origin.1) / reference,
                        z,
                        valid: p.valid,
                    },
                )
            })
            .collect();

        Ok(NormalizedFrame {
            frame_index: frame.index,
            points,
            reference,
            reference_kind,
        })
    }
}

type Anchor = (f32, f32, Option<f32>);

fn midpoint(a: Option<&NormalizedPoint>, b: Option<&NormalizedPoint>) -> Option<Anchor> {
    match (a, b) {
        (Some(a), Some(b)) => {
            let z = match (a.z, b.z) {
                (Some(za), Some(zb)) => Some((za + zb) / 2.0),
                _ => None,
            };
            Some(((a.x + b.x) / 2.0, (a.y + b.y) / 2.0, z))
        }
        (Some(p), None) | (None, Some(p)) => Some((p.x, p.y, p.z)),
        (None, None) => None,
    }
}

fn centroid(points: &BTreeMap<LandmarkName, NormalizedPoint>) -> Option<Anchor> {
    let valid: Vec<&NormalizedPoint> = points.values().filter(|p| p.valid).collect();
    if valid.is_empty() {
        return None;
    }
    let n = valid.len() as f32;
    let x = valid.iter().map(|p| p.x).sum::<f32>() / n;
    let y = valid.iter().map(|p| p.y).sum::<f32>() / n;
    Some((x, y, None))
}

fn planar_distance(a: Anchor, b: Anchor) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn reference_length(
    shoulders: Option<Anchor>,
    hips: Option<Anchor>,
    ankles: Option<Anchor>,
    points: &BTreeMap<LandmarkName, NormalizedPoint>,
) -> Option<(f32, ReferenceKind)> {
    if let (Some(s), Some(h)) = (shoulders, hips) {
        let torso = planar_distance(s, h);
        if torso > REFERENCE_EPSILON {
            return Some((torso, ReferenceKind::Torso));
        }
    }
    if let (Some(h), Some(a)) = (hips, ankles) {
        let leg = planar_distance(h, a);
        if leg > REFERENCE_EPSILON {
            return Some((leg, ReferenceKind::Leg));
        }
    }

    let valid: Vec<&NormalizedPoint> = points.values().filter(|p| p.valid).collect();
    let min_x = valid.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = valid.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = valid.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = valid.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    let diagonal = ((max_x - min_x).powi(2) + (max_y - min_y).powi(2)).sqrt();
    if diagonal.is_finite() && diagonal > REFERENCE_EPSILON {
        Some((diagonal, ReferenceKind::BoundingBox))
    } else {
        None
    }
}
