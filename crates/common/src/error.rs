//! Error types shared across GhostTrail crates.

use std::path::PathBuf;

/// Top-level error type for GhostTrail operations.
#[derive(Debug, thiserror::Error)]
pub enum GhostTrailError {
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState { operation: String, state: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Encoding error: {message}")]
    Encoding { message: String },

    #[error("Metadata error: {message}")]
    Metadata { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GhostTrailError.
pub type GhostTrailResult<T> = Result<T, GhostTrailError>;

impl GhostTrailError {
    pub fn invalid_state(operation: impl Into<String>, state: impl ToString) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding {
            message: msg.into(),
        }
    }

    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
