//! # Generically Serialized Models
//!
//! The default backend: a self-describing artifact deserialized without a
//! declared kind. The payload is matched against the known model families;
//! the oracle is always the model's direct predict method (class labels for
//! classifiers, raw values otherwise), never the probability method.

use serde::Deserialize;

use crate::tensor::{self, Tensor};

use super::errors::{BackendError, BackendResult};
use super::estimator::{Estimator, EstimatorSpec};
use super::graph::{GraphModel, GraphSpec};
use super::module::{ModuleSpec, TensorModule};
use super::oracle::PredictionOracle;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenericSpec {
    Estimator(EstimatorSpec),
    Graph(GraphSpec),
    Module(ModuleSpec),
}

enum Inner {
    Estimator(Estimator),
    Graph(GraphModel),
    Module(TensorModule),
}

/// A generically deserialized model exposing only its predict method
pub struct GenericModel {
    inner: Inner,
}

impl GenericModel {
    /// Deserialize a generic artifact by probing the known model families
    pub fn load(bytes: &[u8]) -> BackendResult<Self> {
        let spec: GenericSpec = serde_json::from_slice(bytes).map_err(|_| {
            BackendError::load(
                "generic",
                "artifact does not match any known serialized model family",
            )
        })?;
        let inner = match spec {
            GenericSpec::Estimator(spec) => Inner::Estimator(Estimator::from_spec(spec)?),
            GenericSpec::Graph(spec) => Inner::Graph(GraphModel::from_spec(spec)?),
            GenericSpec::Module(spec) => Inner::Module(TensorModule::from_spec(spec)?),
        };
        Ok(Self { inner })
    }
}

impl PredictionOracle for GenericModel {
    fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
        match &self.inner {
            Inner::Estimator(est) => {
                let rows =
                    tensor::flatten_rows(batch).map_err(|e| BackendError::Eval(e.to_string()))?;
                Ok(est.predict_values(&rows)?.into_dyn())
            }
            Inner::Graph(graph) => graph.predict(batch),
            Inner::Module(module) => module.predict(batch),
        }
    }
}
