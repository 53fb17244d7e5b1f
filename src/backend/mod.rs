//! # Backend Adapter
//!
//! Classifies a stored model's declared backend kind and produces a uniform
//! prediction function behind the [`PredictionOracle`] trait, hiding all
//! backend-specific loading and invocation differences. Models that are not
//! locally present are reached through the remote-oracle adapter instead.
//!
//! Dispatch is a closed match over [`BackendKind`]; adding a backend means
//! adding a variant and an adapter, never branching on strings at call sites.

pub mod errors;
pub mod estimator;
pub mod generic;
pub mod graph;
pub mod module;
pub mod oracle;
pub mod remote;

use crate::repository::{BackendKind, ModelDescriptor};

pub use errors::{BackendError, BackendResult};
pub use estimator::Estimator;
pub use generic::GenericModel;
pub use graph::GraphModel;
pub use module::TensorModule;
pub use oracle::PredictionOracle;
pub use remote::RemoteOracle;

/// Resolve the uniform prediction oracle for a request.
///
/// First match wins: a local artifact is dispatched on the declared backend
/// kind; with no artifact, a remote URL yields the remote adapter. Exactly
/// one of the two must be present.
pub fn resolve_oracle(
    model: Option<&[u8]>,
    remote_url: Option<&str>,
    descriptor: &ModelDescriptor,
) -> BackendResult<Box<dyn PredictionOracle>> {
    match (model, remote_url) {
        (Some(_), Some(_)) => Err(BackendError::Configuration(
            "a stored model artifact and a prediction URL are mutually exclusive; \
             provide exactly one"
                .to_string(),
        )),
        (Some(bytes), None) => {
            let kind = descriptor.backend.unwrap_or(BackendKind::Generic);
            match kind {
                BackendKind::Graph => Ok(Box::new(GraphModel::load(bytes)?)),
                BackendKind::Estimator => Ok(Box::new(Estimator::load(bytes)?)),
                BackendKind::TensorModule => Ok(Box::new(TensorModule::load(bytes)?)),
                BackendKind::Generic => Ok(Box::new(GenericModel::load(bytes)?)),
                BackendKind::Remote => Err(BackendError::Configuration(
                    "a remote-backed model cannot carry a local artifact".to_string(),
                )),
            }
        }
        (None, Some(url)) => Ok(Box::new(RemoteOracle::new(url)?)),
        (None, None) => Err(BackendError::Configuration(
            "either a stored model identifier or a prediction URL must be provided".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(backend: Option<BackendKind>) -> ModelDescriptor {
        serde_json::from_str::<ModelDescriptor>("{}")
            .map(|mut d| {
                d.backend = backend;
                d
            })
            .unwrap()
    }

    #[test]
    fn test_neither_artifact_nor_url_fails() {
        let err = resolve_oracle(None, None, &descriptor(None)).err().unwrap();
        assert!(matches!(err, BackendError::Configuration(_)));
        assert!(err.to_string().contains("prediction URL"));
    }

    #[test]
    fn test_both_artifact_and_url_fails() {
        let bytes = br#"{"layers": []}"#;
        let err = resolve_oracle(
            Some(bytes),
            Some("http://scorer.example/predict"),
            &descriptor(Some(BackendKind::Graph)),
        )
        .err()
        .unwrap();
        assert!(matches!(err, BackendError::Configuration(_)));
    }

    #[test]
    fn test_undeclared_backend_dispatches_generic() {
        let bytes = br#"{
            "estimator": "linear",
            "coefficients": [[1.0]],
            "intercepts": [0.0],
            "task": "regression"
        }"#;
        assert!(resolve_oracle(Some(bytes), None, &descriptor(None)).is_ok());
    }

    #[test]
    fn test_bad_artifact_is_load_error() {
        let err = resolve_oracle(
            Some(b"not json"),
            None,
            &descriptor(Some(BackendKind::Graph)),
        )
        .err()
        .unwrap();
        assert!(matches!(err, BackendError::Load { .. }));
    }
}
