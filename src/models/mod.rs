pub mod angles;
pub mod landmark;
pub mod rep;
pub mod score;
pub mod session;

pub use angles::{bilateral_mean, AngleName, AngleSample, Joint, SmoothedAngleSample, SmoothedValue};
pub use landmark::{FrameLandmarks, Landmark, LandmarkName};
pub use rep::{FrameRange, IncompleteReason, IncompleteRep, PhaseSpan, Rep, RepFrame, RepPhase};
pub use score::{
    DepthClass, Grade, GroupedFeedback, RepOutcome, RepScore, RuleId, Severity, SeverityCounts,
    UnscoredReason, UnscoredRep, Violation,
};
pub use session::{Exercise, FrameStats, SessionSummary, SymmetryFinding, SymmetrySummary, Trend};
