//! # Artifact Errors

use thiserror::Error;

/// Result type for artifact operations
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Artifact storage errors
#[derive(Debug, Clone, Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ArtifactError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ArtifactError::NotFound(_) => 404,
            ArtifactError::InvalidName(_) => 400,
            ArtifactError::Serialization(_) => 500,
            ArtifactError::Io(_) => 500,
        }
    }
}
