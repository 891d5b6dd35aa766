use serde::{Deserialize, Serialize};

use super::angles::{AngleSample, SmoothedAngleSample};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RepPhase {
    Standing,
    Descending,
    Bottom,
    Ascending,
}

impl RepPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepPhase::Standing => "standing",
            RepPhase::Descending => "descending",
            RepPhase::Bottom => "bottom",
            RepPhase::Ascending => "ascending",
        }
    }

    /// The only phase allowed to follow this one within a rep.
    pub fn next(&self) -> RepPhase {
        match self {
            RepPhase::Standing => RepPhase::Descending,
            RepPhase::Descending => RepPhase::Bottom,
            RepPhase::Bottom => RepPhase::Ascending,
            RepPhase::Ascending => RepPhase::Standing,
        }
    }
}

/// Inclusive range of frame indices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FrameRange {
    pub start: u64,
    pub end: u64,
}

impl FrameRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn single(frame: u64) -> Self {
        Self {
            start: frame,
            end: frame,
        }
    }

    pub fn contains(&self, frame: u64) -> bool {
        (self.start..=self.end).contains(&frame)
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSpan {
    pub phase: RepPhase,
    pub start_frame: u64,
    pub end_frame: u64,
}

impl PhaseSpan {
    pub fn range(&self) -> FrameRange {
        FrameRange::new(self.start_frame, self.end_frame)
    }
}

/// Everything the engine knows about one frame inside a rep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepFrame {
    pub raw: AngleSample,
    pub smoothed: SmoothedAngleSample,
}

impl RepFrame {
    pub fn index(&self) -> u64 {
        self.raw.frame_index
    }
}

/// One closed STANDING → DESCENDING → BOTTOM → ASCENDING → STANDING cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rep {
    pub index: usize,
    pub phases: Vec<PhaseSpan>,
    /// Frame of the minimum knee angle.
    pub bottom_frame: u64,
    /// Smoothed knee angle where the segmenter anchored the bottom.
    pub depth_deg: f32,
    #[serde(skip)]
    pub frames: Vec<RepFrame>,
}

impl Rep {
    pub fn span(&self, phase: RepPhase) -> Option<&PhaseSpan> {
        self.phases.iter().find(|s| s.phase == phase)
    }

    /// Opening standing span (the one preceding the descent).
    pub fn opening_standing(&self) -> Option<&PhaseSpan> {
        self.phases.first().filter(|s| s.phase == RepPhase::Standing)
    }

    pub fn range(&self) -> FrameRange {
        let start = self.phases.first().map(|s| s.start_frame).unwrap_or(self.bottom_frame);
        let end = self.phases.last().map(|s| s.end_frame).unwrap_or(self.bottom_frame);
        FrameRange::new(start, end)
    }

    pub fn frame(&self, index: u64) -> Option<&RepFrame> {
        self.frames
            .binary_search_by_key(&index, |f| f.index())
            .ok()
            .map(|pos| &self.frames[pos])
    }

    pub fn frames_in(&self, range: FrameRange) -> impl Iterator<Item = &RepFrame> {
        self.frames.iter().filter(move |f| range.contains(f.index()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IncompleteReason {
    /// The frame sequence ended before the lifter stood back up.
    VideoEnded,
    /// The driver stopped feeding frames.
    Cancelled,
}

/// A cycle that left STANDING but never closed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteRep {
    pub index: usize,
    pub phases: Vec<PhaseSpan>,
    pub last_phase: RepPhase,
    pub frames: FrameRange,
    pub reason: IncompleteReason,
}
