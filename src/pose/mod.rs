pub mod angles;
pub mod normalizer;
pub mod ring;
pub mod smoother;

pub use angles::{AngleCalculator, AngleDefinition};
pub use normalizer::{InsufficientLandmarks, LandmarkNormalizer, NormalizedFrame, NormalizedPoint};
pub use smoother::TemporalSmoother;
