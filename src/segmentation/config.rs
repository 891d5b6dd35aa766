use crate::config::EngineConfig;

/// Thresholds for the rep phase state machine.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Knee angle at or above which a frame counts as standing
    pub standing_threshold_deg: f32,

    /// Consecutive qualifying frames needed to accept any transition
    pub debounce_frames: u32,

    /// Knee changes within this band are flat, not motion
    pub noise_tolerance_deg: f32,

    /// Back angle jumps above this are jitter; the frame is ignored
    pub back_jitter_limit_deg: f32,

    /// Descents that stay within this many degrees of standing are aborted
    pub min_rep_excursion_deg: f32,

    /// Frames kept for a cycle in progress, on top of the standing baseline
    pub max_cycle_frames: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            standing_threshold_deg: 160.0,
            debounce_frames: 3,
            noise_tolerance_deg: 1.0,
            back_jitter_limit_deg: 25.0,
            min_rep_excursion_deg: 20.0,
            max_cycle_frames: 900,
        }
    }
}

impl From<&EngineConfig> for SegmentationConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            standing_threshold_deg: config.standing_threshold_deg,
            debounce_frames: config.debounce_frames,
            noise_tolerance_deg: config.noise_tolerance_deg,
            back_jitter_limit_deg: config.back_jitter_limit_deg,
            min_rep_excursion_deg: config.min_rep_excursion_deg,
            max_cycle_frames: config.max_cycle_frames,
        }
    }
}

impl SegmentationConfig {
    /// Deepest knee angle a real rep must reach.
    pub fn rep_floor_deg(&self) -> f32 {
        self.standing_threshold_deg - self.min_rep_excursion_deg
    }
}
