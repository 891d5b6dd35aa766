pub mod algorithm;
pub mod config;
pub mod tracker;

pub use algorithm::{step, Observation, SegmentEvent, SegmenterState};
pub use config::SegmentationConfig;
pub use tracker::{RepTracker, TrackerUpdate};
