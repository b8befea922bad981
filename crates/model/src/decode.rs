//! Per-frame decode failures.

use ghosttrail_common::error::GhostTrailError;

/// Why a decoder could not produce the frame for one sample time.
///
/// Never fatal to a run: the session counts it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("frame decode failed: {message}")]
    Failed { message: String },

    /// The request was withdrawn by `cancel_all` before it finished.
    #[error("frame request cancelled")]
    Cancelled,
}

impl DecodeError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed {
            message: msg.into(),
        }
    }
}

impl From<DecodeError> for GhostTrailError {
    fn from(err: DecodeError) -> Self {
        GhostTrailError::decode(err.to_string())
    }
}
