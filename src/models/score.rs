use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::angles::AngleName;
use super::rep::FrameRange;
use super::session::SymmetryFinding;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    ExcessiveDepth,
    LumbarFlexion,
    PosteriorPelvicTilt,
    KneeValgus,
    InsufficientDepth,
    TrunkTibiaBias,
    Asymmetry,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::ExcessiveDepth => "excessive_depth",
            RuleId::LumbarFlexion => "lumbar_flexion",
            RuleId::PosteriorPelvicTilt => "posterior_pelvic_tilt",
            RuleId::KneeValgus => "knee_valgus",
            RuleId::InsufficientDepth => "insufficient_depth",
            RuleId::TrunkTibiaBias => "trunk_tibia_bias",
            RuleId::Asymmetry => "asymmetry",
        }
    }
}

/// Bottom-of-squat depth bucket. Informational, never scored by itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DepthClass {
    Shallow,
    Medium,
    Deep,
}

impl DepthClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepthClass::Shallow => "shallow",
            DepthClass::Medium => "medium",
            DepthClass::Deep => "deep",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule: RuleId,
    /// 0 is most urgent.
    pub priority: u8,
    pub severity: Severity,
    /// Points deducted; 0 for informational findings.
    pub points: u32,
    pub frames: FrameRange,
    pub message: String,
    /// Measured values behind the message.
    pub details: BTreeMap<String, f32>,
}

impl Violation {
    pub fn is_informational(&self) -> bool {
        self.points == 0
    }
}

/// Violations per severity, plus the rules that did not fire.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub passed: usize,
}

/// Violation messages bucketed by how urgently they need attention.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupedFeedback {
    pub critical_issues: Vec<String>,
    /// High and medium severity.
    pub improvements: Vec<String>,
    pub optimizations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepScore {
    pub rep_index: usize,
    /// 100 minus deducted points, floored at 0.
    pub score: u32,
    /// Highest priority first.
    pub violations: Vec<Violation>,
    pub depth: DepthClass,
    pub bottom_frame: u64,
    pub bottom_knee_deg: f32,
    pub grade: Grade,
    pub passed: bool,
    pub counts: SeverityCounts,
    pub feedback: Vec<String>,
    pub grouped_feedback: GroupedFeedback,
    pub highlights: Vec<String>,
    pub summary: String,
    /// Bottom-frame left/right differences over the symmetry threshold.
    pub symmetry: Vec<SymmetryFinding>,
}

impl RepScore {
    pub fn has(&self, rule: RuleId) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }

    pub fn violation(&self, rule: RuleId) -> Option<&Violation> {
        self.violations.iter().find(|v| v.rule == rule)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UnscoredReason {
    /// Required angles were invalid at the bottom of the rep.
    InsufficientLandmarks { missing: Vec<AngleName> },
    /// The cycle never closed.
    IncompleteCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnscoredRep {
    pub rep_index: usize,
    pub frames: FrameRange,
    pub reason: UnscoredReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RepOutcome {
    Scored(RepScore),
    Unscored(UnscoredRep),
}

impl RepOutcome {
    pub fn rep_index(&self) -> usize {
        match self {
            RepOutcome::Scored(score) => score.rep_index,
            RepOutcome::Unscored(unscored) => unscored.rep_index,
        }
    }

    pub fn score(&self) -> Option<&RepScore> {
        match self {
            RepOutcome::Scored(score) => Some(score),
            RepOutcome::Unscored(_) => None,
        }
    }
}
