use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::angles::Joint;
use super::rep::IncompleteRep;
use super::score::{RepOutcome, UnscoredRep};
use crate::config::AggregationMode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Exercise {
    Squat,
}

impl Exercise {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exercise::Squat => "squat",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    /// Fewer than two scored reps.
    Insufficient,
}

/// Counters describing how much of the input was usable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FrameStats {
    /// Frames handed to the engine, including skipped ones.
    pub received: u64,
    /// Frames that went through angle computation.
    pub analyzed: u64,
    /// Analyzed frames without enough valid landmarks.
    pub insufficient: u64,
    /// Frames dropped as malformed or out of order.
    pub rejected: u64,
    /// Frames skipped by `frame_skip`.
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymmetryFinding {
    pub rep_index: usize,
    pub joint: Joint,
    pub frame: u64,
    pub left_deg: f32,
    pub right_deg: f32,
    pub delta_deg: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymmetrySummary {
    pub threshold_deg: f32,
    /// Reps with at least one finding.
    pub reps_flagged: usize,
    pub max_knee_delta_deg: Option<f32>,
    pub max_hip_delta_deg: Option<f32>,
    pub findings: Vec<SymmetryFinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub exercise: Exercise,
    pub generated_at: DateTime<Utc>,
    /// Every closed rep in index order, scored or not.
    pub reps: Vec<RepOutcome>,
    pub incomplete: Vec<IncompleteRep>,
    /// Reps excluded from the aggregate, with the reason.
    pub unscored: Vec<UnscoredRep>,
    pub aggregation: AggregationMode,
    /// `None` when no rep could be scored.
    pub session_score: Option<f32>,
    pub best_rep: Option<usize>,
    /// Lowest-scoring rep.
    pub rep_to_review: Option<usize>,
    pub trend: Trend,
    pub symmetry: SymmetrySummary,
    pub frames: FrameStats,
    /// False when the driver stopped early.
    pub completed: bool,
}

impl SessionSummary {
    pub fn scored_count(&self) -> usize {
        self.reps.iter().filter(|r| r.score().is_some()).count()
    }
}
