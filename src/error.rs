use thiserror::Error;

/// Errors that stop the engine from accepting input.
///
/// Missing or low-confidence landmarks are not errors: they surface as
/// invalid angles and unscored reps instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),
    #[error("malformed landmark set in frame {frame_index}: {reason}")]
    MalformedLandmarkSet { frame_index: u64, reason: String },
    #[error("frame {got} received after frame {previous}")]
    FrameOutOfOrder { previous: u64, got: u64 },
}

impl EngineError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        EngineError::ConfigurationInvalid(message.into())
    }

    /// Whether the driver may drop the offending frame and keep going.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedLandmarkSet { .. } | EngineError::FrameOutOfOrder { .. }
        )
    }
}
