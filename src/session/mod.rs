pub mod aggregator;
pub mod driver;
pub mod engine;

pub use aggregator::SessionAggregator;
pub use driver::{analyze, analyze_channel, analyze_until, FrameSource, MalformedPolicy};
pub use engine::{AnalysisSession, FrameReport};
