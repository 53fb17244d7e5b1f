//! # Graph-Based Models
//!
//! Computation-graph models serialized as a sequence of dense layers. The
//! oracle invokes the forward pass directly on the batch; output is raw,
//! already probability-shaped when the final layer is softmax.
//!
//! Graph execution settings are process-wide and fixed exactly once, before
//! the first graph model is loaded (no teardown). Callers never toggle them
//! directly; loading a graph model performs the initialization.

use std::sync::OnceLock;

use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;

use crate::tensor::{self, Tensor};

use super::errors::{BackendError, BackendResult};
use super::oracle::PredictionOracle;

/// Process-wide graph execution settings
#[derive(Debug, Clone, Copy)]
pub struct GraphRuntime {
    /// Rows evaluated per forward chunk; bounds peak activation memory
    pub max_batch_rows: usize,
}

static RUNTIME: OnceLock<GraphRuntime> = OnceLock::new();

/// The active graph runtime, initializing it on first use
pub fn runtime() -> &'static GraphRuntime {
    RUNTIME.get_or_init(|| GraphRuntime {
        max_batch_rows: 256,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Softmax,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LayerSpec {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    activation: Activation,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphSpec {
    layers: Vec<LayerSpec>,
}

#[derive(Debug)]
struct DenseLayer {
    weights: Array2<f64>, // in_dim x out_dim
    bias: Array1<f64>,
    activation: Activation,
}

/// A loaded computation-graph model
#[derive(Debug)]
pub struct GraphModel {
    layers: Vec<DenseLayer>,
    input_dim: usize,
}

impl GraphModel {
    /// Deserialize a graph artifact and fix the process-wide runtime
    pub fn load(bytes: &[u8]) -> BackendResult<Self> {
        let spec: GraphSpec = serde_json::from_slice(bytes)
            .map_err(|e| BackendError::load("graph", e.to_string()))?;
        Self::from_spec(spec)
    }

    pub(crate) fn from_spec(spec: GraphSpec) -> BackendResult<Self> {
        // Runtime settings must be fixed before any graph executes.
        let _ = runtime();

        if spec.layers.is_empty() {
            return Err(BackendError::load("graph", "graph has no layers"));
        }

        let mut layers = Vec::with_capacity(spec.layers.len());
        let mut prev_out: Option<usize> = None;
        for (i, layer) in spec.layers.into_iter().enumerate() {
            let in_dim = layer.weights.len();
            let out_dim = layer.weights.first().map(Vec::len).unwrap_or(0);
            if in_dim == 0 || out_dim == 0 {
                return Err(BackendError::load(
                    "graph",
                    format!("layer {} has an empty weight matrix", i),
                ));
            }
            if layer.weights.iter().any(|row| row.len() != out_dim) {
                return Err(BackendError::load(
                    "graph",
                    format!("layer {} weight matrix is ragged", i),
                ));
            }
            if layer.bias.len() != out_dim {
                return Err(BackendError::load(
                    "graph",
                    format!(
                        "layer {} bias has {} entries for {} outputs",
                        i,
                        layer.bias.len(),
                        out_dim
                    ),
                ));
            }
            if let Some(prev) = prev_out {
                if prev != in_dim {
                    return Err(BackendError::load(
                        "graph",
                        format!(
                            "layer {} expects {} inputs but the previous layer produces {}",
                            i, in_dim, prev
                        ),
                    ));
                }
            }
            prev_out = Some(out_dim);

            let flat: Vec<f64> = layer.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((in_dim, out_dim), flat)
                .map_err(|e| BackendError::load("graph", e.to_string()))?;
            layers.push(DenseLayer {
                weights,
                bias: Array1::from_vec(layer.bias),
                activation: layer.activation,
            });
        }

        let input_dim = layers[0].weights.nrows();
        Ok(Self { layers, input_dim })
    }

    /// Forward pass over a flattened batch (N x input_dim)
    pub fn forward(&self, rows: &Array2<f64>) -> BackendResult<Array2<f64>> {
        if rows.ncols() != self.input_dim {
            return Err(BackendError::Eval(format!(
                "graph expects {} input features, got {}",
                self.input_dim,
                rows.ncols()
            )));
        }

        let chunk_rows = runtime().max_batch_rows;
        let out_dim = self
            .layers
            .last()
            .map(|l| l.weights.ncols())
            .unwrap_or(0);
        let mut output = Array2::zeros((rows.nrows(), out_dim));
        let mut written = 0;
        for chunk in rows.axis_chunks_iter(Axis(0), chunk_rows) {
            let mut h = chunk.to_owned();
            for layer in &self.layers {
                let mut next = h.dot(&layer.weights);
                next += &layer.bias;
                apply_activation(&mut next, &layer.activation);
                h = next;
            }
            let n = h.nrows();
            output
                .slice_mut(ndarray::s![written..written + n, ..])
                .assign(&h);
            written += n;
        }
        Ok(output)
    }
}

fn apply_activation(h: &mut Array2<f64>, activation: &Activation) {
    match activation {
        Activation::Linear => {}
        Activation::Relu => h.mapv_inplace(|v| v.max(0.0)),
        Activation::Sigmoid => h.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
        Activation::Softmax => {
            for mut row in h.axis_iter_mut(Axis(0)) {
                let max = row.fold(f64::NEG_INFINITY, |m, v| m.max(*v));
                row.mapv_inplace(|v| (v - max).exp());
                let sum = row.sum();
                if sum > 0.0 {
                    row.mapv_inplace(|v| v / sum);
                }
            }
        }
    }
}

impl PredictionOracle for GraphModel {
    fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
        let rows = tensor::flatten_rows(batch).map_err(|e| BackendError::Eval(e.to_string()))?;
        Ok(self.forward(&rows)?.into_dyn())
    }
}
