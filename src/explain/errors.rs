//! # Explanation Errors
//!
//! The request-level error taxonomy. Every fatal condition aborts the
//! request and is surfaced with a descriptive message; no partial artifact
//! is ever referenced by an error response. Non-fatal conditions (unknown
//! plot types, empty algorithm results) never appear here - they are
//! absorbed into the result payload.

use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::backend::BackendError;
use crate::render::RenderError;
use crate::repository::RepositoryError;

/// Result type for explanation orchestration
pub type ExplainResult<T> = Result<T, ExplainError>;

/// Fatal explanation errors
#[derive(Debug, Error)]
pub enum ExplainError {
    /// Invalid or contradictory request/model configuration
    #[error("{0}")]
    Configuration(String),

    /// Class-slice selection out of range on a multi-class result
    #[error("Output index {index} is out of range for {outputs} model outputs")]
    OutputIndexOutOfRange { index: usize, outputs: usize },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ExplainError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ExplainError::Configuration(_) => 400,
            ExplainError::OutputIndexOutOfRange { .. } => 400,
            ExplainError::Repository(e) => e.status_code(),
            ExplainError::Backend(e) => e.status_code(),
            ExplainError::Artifact(e) => e.status_code(),
            ExplainError::Render(e) => e.status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ExplainError::Configuration("x".into()).status_code(), 400);
        assert_eq!(
            ExplainError::OutputIndexOutOfRange {
                index: 3,
                outputs: 3
            }
            .status_code(),
            400
        );
        assert_eq!(
            ExplainError::Backend(BackendError::Transport("x".into())).status_code(),
            502
        );
        assert_eq!(
            ExplainError::Repository(RepositoryError::ModelNotFound("m".into())).status_code(),
            404
        );
    }

    #[test]
    fn test_backend_configuration_maps_to_400() {
        let err = ExplainError::Backend(BackendError::Configuration(
            "either a stored model identifier or a prediction URL must be provided".into(),
        ));
        assert_eq!(err.status_code(), 400);
    }
}
