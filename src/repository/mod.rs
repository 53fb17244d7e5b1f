//! # Model Repository
//!
//! Filesystem-backed lookup of stored models by identifier. Each model lives
//! in its own directory under the repository root:
//!
//! - `info.json` - required metadata descriptor
//! - `model.json` - optional serialized model artifact
//! - `data.json` - optional serialized reference dataset
//!
//! Entries are resolved fresh per request; nothing is cached or shared.

pub mod descriptor;
pub mod errors;

use std::fs;
use std::path::PathBuf;

pub use descriptor::{
    BackendKind, FeatureDomain, FeatureSpec, ModelDescriptor, ReferenceDataset,
};
pub use errors::{RepositoryError, RepositoryResult};

/// A resolved repository entry, owned by a single request
#[derive(Debug, Clone)]
pub struct ModelEntry {
    /// Serialized model artifact, absent for URL-only models
    pub model: Option<Vec<u8>>,
    /// Serialized reference dataset (features plus trailing target column)
    pub reference: Option<ReferenceDataset>,
    /// Metadata descriptor
    pub descriptor: ModelDescriptor,
}

/// Filesystem-backed model repository
#[derive(Debug, Clone)]
pub struct ModelRepository {
    root: PathBuf,
}

impl ModelRepository {
    /// Open a repository rooted at the given directory
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository root directory
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Resolve a model identifier to its artifacts and descriptor
    pub fn fetch(&self, id: &str) -> RepositoryResult<ModelEntry> {
        Self::validate_id(id)?;
        let dir = self.root.join(id);

        let info_path = dir.join("info.json");
        let info_bytes = fs::read(&info_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RepositoryError::ModelNotFound(id.to_string())
            } else {
                RepositoryError::Io(e.to_string())
            }
        })?;
        let descriptor: ModelDescriptor = serde_json::from_slice(&info_bytes)
            .map_err(|e| RepositoryError::DescriptorInvalid(e.to_string()))?;

        let model = match fs::read(dir.join("model.json")) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(RepositoryError::Io(e.to_string())),
        };

        let reference = match fs::read(dir.join("data.json")) {
            Ok(bytes) => Some(
                serde_json::from_slice::<ReferenceDataset>(&bytes)
                    .map_err(|e| RepositoryError::DatasetInvalid(e.to_string()))?,
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(RepositoryError::Io(e.to_string())),
        };

        Ok(ModelEntry {
            model,
            reference,
            descriptor,
        })
    }

    fn validate_id(id: &str) -> RepositoryResult<()> {
        let clean = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !id.contains("..");
        if clean {
            Ok(())
        } else {
            Err(RepositoryError::InvalidId(id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_model(dir: &std::path::Path, id: &str, info: &str) {
        let model_dir = dir.join(id);
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(model_dir.join("info.json"), info).unwrap();
    }

    #[test]
    fn test_fetch_descriptor_only() {
        let temp = TempDir::new().unwrap();
        write_model(temp.path(), "m1", r#"{"backend": "estimator"}"#);

        let repo = ModelRepository::open(temp.path());
        let entry = repo.fetch("m1").unwrap();
        assert_eq!(entry.descriptor.backend, Some(BackendKind::Estimator));
        assert!(entry.model.is_none());
        assert!(entry.reference.is_none());
    }

    #[test]
    fn test_missing_model_is_not_found() {
        let temp = TempDir::new().unwrap();
        let repo = ModelRepository::open(temp.path());
        assert!(matches!(
            repo.fetch("absent"),
            Err(RepositoryError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let temp = TempDir::new().unwrap();
        let repo = ModelRepository::open(temp.path());
        assert!(matches!(
            repo.fetch("../escape"),
            Err(RepositoryError::InvalidId(_))
        ));
    }

    #[test]
    fn test_unknown_backend_string_is_generic() {
        let temp = TempDir::new().unwrap();
        write_model(temp.path(), "m2", r#"{"backend": "something-else"}"#);

        let repo = ModelRepository::open(temp.path());
        let entry = repo.fetch("m2").unwrap();
        assert_eq!(entry.descriptor.backend, Some(BackendKind::Generic));
    }
}
