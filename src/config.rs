use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::EngineError;

/// How per-rep scores are folded into the session score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum AggregationMode {
    /// Mean of every scored rep.
    Mean,
    /// Mean of the `count` lowest-scoring reps.
    WorstOf { count: usize },
}

impl Default for AggregationMode {
    fn default() -> Self {
        AggregationMode::Mean
    }
}

/// Every threshold and toggle of the engine, flat, with documented defaults.
///
/// Angles are in degrees. Distances are in reference units (torso length
/// after normalization).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Landmarks below this confidence are marked invalid. Default 0.5.
    pub min_confidence: f32,
    /// Minimum number of valid required landmarks for a frame to be usable. Default 4.
    pub min_valid_landmarks: usize,
    /// Use the depth coordinate for joint angles when every point carries one. Default true.
    pub use_depth: bool,

    /// Trailing smoothing window, in frames. Default 5.
    pub smoothing_window: usize,
    /// Valid samples needed inside the window to emit a smoothed value. Default 3.
    pub smoothing_min_samples: usize,

    /// Consecutive frames needed to accept a phase transition. Default 3.
    pub debounce_frames: u32,
    /// Frame-over-frame knee change treated as flat. Default 1.0.
    pub noise_tolerance_deg: f32,
    /// Back angle jumps larger than this are treated as jitter, not motion. Default 25.
    pub back_jitter_limit_deg: f32,
    /// Knee angle above which the lifter is standing. Default 160.
    pub standing_threshold_deg: f32,
    /// A descent must bottom out at least this far below standing to count as a rep. Default 20.
    pub min_rep_excursion_deg: f32,
    /// Standing frames kept before a descent for the baseline. Default 15.
    pub baseline_frames: usize,
    /// Frames buffered for a cycle that has left standing; older ones are dropped. Default 900.
    pub max_cycle_frames: usize,

    /// Bottom knee angle above which depth is insufficient (Shallow). Default 110.
    pub acceptable_depth_deg: f32,
    /// Boundary between Medium and Deep. Default 90.
    pub medium_depth_deg: f32,
    /// Bottom knee angle below which depth is a safety concern. Default 45.
    pub excessive_depth_deg: f32,
    /// Depth band praised as ideal. Default 60..=100.
    pub ideal_depth_min_deg: f32,
    pub ideal_depth_max_deg: f32,

    /// Hip angle floor for posterior pelvic tilt. Default 60.
    pub hip_floor_deg: f32,
    /// Back angle loss from the standing baseline that counts as flexion. Default 30.
    pub lumbar_flexion_delta_deg: f32,
    /// Consecutive flexed frames needed near the bottom. Default 3.
    pub lumbar_flexion_frames: usize,
    /// Half-width of the window around the bottom frame for sustained checks. Default 6.
    pub bottom_window_frames: u64,
    /// Knee width / ankle width below which knees cave in. Default 0.8.
    pub valgus_min_ratio: f32,
    /// Neutral trunk-tibia band. Default -10..=10.
    pub trunk_tibia_min_deg: f32,
    pub trunk_tibia_max_deg: f32,
    /// Left/right difference reported as asymmetry. Default 10.
    pub symmetry_threshold_deg: f32,

    pub points_excessive_depth: u32,
    pub points_lumbar_flexion: u32,
    pub points_pelvic_tilt: u32,
    pub points_knee_valgus: u32,
    pub points_insufficient_depth: u32,
    pub points_trunk_tibia: u32,

    /// Minimum score for a rep to pass. Default 70.
    pub passing_score: u32,
    /// Feedback lines kept per rep. Default 5.
    pub max_feedback_items: usize,
    /// Frames skipped between analyzed frames (0 = analyze all).
    pub frame_skip: u32,
    pub aggregation: AggregationMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_valid_landmarks: 4,
            use_depth: true,
            smoothing_window: 5,
            smoothing_min_samples: 3,
            debounce_frames: 3,
            noise_tolerance_deg: 1.0,
            back_jitter_limit_deg: 25.0,
            standing_threshold_deg: 160.0,
            min_rep_excursion_deg: 20.0,
            baseline_frames: 15,
            max_cycle_frames: 900,
            acceptable_depth_deg: 110.0,
            medium_depth_deg: 90.0,
            excessive_depth_deg: 45.0,
            ideal_depth_min_deg: 60.0,
            ideal_depth_max_deg: 100.0,
            hip_floor_deg: 60.0,
            lumbar_flexion_delta_deg: 30.0,
            lumbar_flexion_frames: 3,
            bottom_window_frames: 6,
            valgus_min_ratio: 0.8,
            trunk_tibia_min_deg: -10.0,
            trunk_tibia_max_deg: 10.0,
            symmetry_threshold_deg: 10.0,
            points_excessive_depth: 15,
            points_lumbar_flexion: 30,
            points_pelvic_tilt: 25,
            points_knee_valgus: 20,
            points_insufficient_depth: 10,
            points_trunk_tibia: 5,
            passing_score: 70,
            max_feedback_items: 5,
            frame_skip: 0,
            aggregation: AggregationMode::Mean,
        }
    }
}

fn ensure(condition: bool, message: &str) -> Result<(), EngineError> {
    if condition {
        Ok(())
    } else {
        Err(EngineError::config(message))
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config from {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse engine config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write engine config to {}", path.display()))
    }

    /// Reject thresholds that are out of logical range. Runs before any frame is seen.
    pub fn validate(&self) -> Result<(), EngineError> {
        let floats = [
            self.min_confidence,
            self.noise_tolerance_deg,
            self.back_jitter_limit_deg,
            self.standing_threshold_deg,
            self.min_rep_excursion_deg,
            self.acceptable_depth_deg,
            self.medium_depth_deg,
            self.excessive_depth_deg,
            self.ideal_depth_min_deg,
            self.ideal_depth_max_deg,
            self.hip_floor_deg,
            self.lumbar_flexion_delta_deg,
            self.valgus_min_ratio,
            self.trunk_tibia_min_deg,
            self.trunk_tibia_max_deg,
            self.symmetry_threshold_deg,
        ];
        ensure(floats.iter().all(|v| v.is_finite()), "all thresholds must be finite")?;

        // Landmarks
        ensure(
            (0.0..=1.0).contains(&self.min_confidence),
            "min_confidence must be in [0, 1]",
        )?;
        ensure(self.min_valid_landmarks >= 1, "min_valid_landmarks must be at least 1")?;

        // Smoothing
        ensure(self.smoothing_window >= 1, "smoothing_window must be at least 1")?;
        ensure(
            (1..=self.smoothing_window).contains(&self.smoothing_min_samples),
            "smoothing_min_samples must be in [1, smoothing_window]",
        )?;

        // Segmentation
        ensure(self.debounce_frames >= 1, "debounce_frames must be at least 1")?;
        ensure(self.noise_tolerance_deg >= 0.0, "noise_tolerance_deg must be non-negative")?;
        ensure(self.back_jitter_limit_deg > 0.0, "back_jitter_limit_deg must be positive")?;
        ensure(
            self.standing_threshold_deg > 0.0 && self.standing_threshold_deg <= 180.0,
            "standing_threshold_deg must be in (0, 180]",
        )?;
        ensure(self.min_rep_excursion_deg >= 0.0, "min_rep_excursion_deg must be non-negative")?;
        ensure(self.baseline_frames >= 1, "baseline_frames must be at least 1")?;
        ensure(
            self.max_cycle_frames > self.smoothing_window,
            "max_cycle_frames must exceed smoothing_window",
        )?;

        // Depth bands
        ensure(
            self.excessive_depth_deg < self.medium_depth_deg
                && self.medium_depth_deg < self.acceptable_depth_deg
                && self.acceptable_depth_deg < self.standing_threshold_deg,
            "depth thresholds must satisfy excessive < medium < acceptable < standing",
        )?;
        ensure(
            self.ideal_depth_min_deg <= self.ideal_depth_max_deg,
            "ideal depth band must have min <= max",
        )?;

        // Rules
        ensure(
            (0.0..=180.0).contains(&self.hip_floor_deg),
            "hip_floor_deg must be in [0, 180]",
        )?;
        ensure(self.lumbar_flexion_delta_deg > 0.0, "lumbar_flexion_delta_deg must be positive")?;
        ensure(self.lumbar_flexion_frames >= 1, "lumbar_flexion_frames must be at least 1")?;
        ensure(self.valgus_min_ratio > 0.0, "valgus_min_ratio must be positive")?;
        ensure(
            self.trunk_tibia_min_deg <= self.trunk_tibia_max_deg,
            "trunk-tibia neutral band must have min <= max",
        )?;
        ensure(self.symmetry_threshold_deg >= 0.0, "symmetry_threshold_deg must be non-negative")?;

        // Scoring
        let points = [
            self.points_excessive_depth,
            self.points_lumbar_flexion,
            self.points_pelvic_tilt,
            self.points_knee_valgus,
            self.points_insufficient_depth,
            self.points_trunk_tibia,
        ];
        ensure(points.iter().all(|p| *p <= 100), "rule points must be in [0, 100]")?;
        ensure(self.passing_score <= 100, "passing_score must be in [0, 100]")?;
        if let AggregationMode::WorstOf { count } = self.aggregation {
            ensure(count >= 1, "worst-of aggregation needs a count of at least 1")?;
        }

        Ok(())
    }
}
