//! # Repository Errors

use thiserror::Error;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Model repository errors
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid model identifier: {0}")]
    InvalidId(String),

    #[error("Invalid model descriptor: {0}")]
    DescriptorInvalid(String),

    #[error("Invalid reference dataset: {0}")]
    DatasetInvalid(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl RepositoryError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            RepositoryError::ModelNotFound(_) => 404,
            RepositoryError::InvalidId(_) => 400,
            RepositoryError::DescriptorInvalid(_) => 500,
            RepositoryError::DatasetInvalid(_) => 500,
            RepositoryError::Io(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RepositoryError::ModelNotFound("m".into()).status_code(), 404);
        assert_eq!(RepositoryError::InvalidId("..".into()).status_code(), 400);
        assert_eq!(RepositoryError::Io("disk".into()).status_code(), 500);
    }
}
