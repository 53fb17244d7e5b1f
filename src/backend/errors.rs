//! # Backend Errors

use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend adapter errors
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Failed to load {kind} model: {reason}")]
    Load { kind: &'static str, reason: String },

    #[error("Model evaluation failed: {0}")]
    Eval(String),

    #[error("Remote prediction call failed: {0}")]
    Transport(String),

    #[error("{0}")]
    Configuration(String),
}

impl BackendError {
    pub fn load(kind: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Load {
            kind,
            reason: reason.into(),
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            BackendError::Load { .. } => 500,
            BackendError::Eval(_) => 500,
            BackendError::Transport(_) => 502,
            BackendError::Configuration(_) => 400,
        }
    }
}
