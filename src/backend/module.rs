//! # Tensor-Module Models
//!
//! Tensor-computation modules serialized as a flat list of tensor ops. The
//! oracle calls the module's predict method, which runs the op list over the
//! batch. A single-column result is returned as a rank-1 value vector.

use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;

use crate::tensor::{self, Tensor};

use super::errors::{BackendError, BackendResult};
use super::oracle::PredictionOracle;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum OpSpec {
    MatMul { weights: Vec<Vec<f64>> },
    BiasAdd { bias: Vec<f64> },
    Relu,
    Sigmoid,
    Softmax,
    Scale { factor: f64 },
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModuleSpec {
    ops: Vec<OpSpec>,
}

#[derive(Debug)]
enum Op {
    MatMul(Array2<f64>),
    BiasAdd(Array1<f64>),
    Relu,
    Sigmoid,
    Softmax,
    Scale(f64),
}

/// A loaded tensor-computation module
#[derive(Debug)]
pub struct TensorModule {
    ops: Vec<Op>,
}

impl TensorModule {
    /// Deserialize a tensor-module artifact
    pub fn load(bytes: &[u8]) -> BackendResult<Self> {
        let spec: ModuleSpec = serde_json::from_slice(bytes)
            .map_err(|e| BackendError::load("tensor-module", e.to_string()))?;
        Self::from_spec(spec)
    }

    pub(crate) fn from_spec(spec: ModuleSpec) -> BackendResult<Self> {
        if spec.ops.is_empty() {
            return Err(BackendError::load("tensor-module", "module has no ops"));
        }
        let mut ops = Vec::with_capacity(spec.ops.len());
        for (i, op) in spec.ops.into_iter().enumerate() {
            ops.push(match op {
                OpSpec::MatMul { weights } => {
                    let rows = weights.len();
                    let cols = weights.first().map(Vec::len).unwrap_or(0);
                    if rows == 0 || cols == 0 || weights.iter().any(|r| r.len() != cols) {
                        return Err(BackendError::load(
                            "tensor-module",
                            format!("op {} has an invalid weight matrix", i),
                        ));
                    }
                    let flat: Vec<f64> = weights.into_iter().flatten().collect();
                    Op::MatMul(
                        Array2::from_shape_vec((rows, cols), flat)
                            .map_err(|e| BackendError::load("tensor-module", e.to_string()))?,
                    )
                }
                OpSpec::BiasAdd { bias } => Op::BiasAdd(Array1::from_vec(bias)),
                OpSpec::Relu => Op::Relu,
                OpSpec::Sigmoid => Op::Sigmoid,
                OpSpec::Softmax => Op::Softmax,
                OpSpec::Scale { factor } => Op::Scale(factor),
            });
        }
        Ok(Self { ops })
    }

    /// The module's predict method: run the op list over a flattened batch
    pub fn module_predict(&self, rows: &Array2<f64>) -> BackendResult<Array2<f64>> {
        let mut h = rows.clone();
        for (i, op) in self.ops.iter().enumerate() {
            match op {
                Op::MatMul(w) => {
                    if h.ncols() != w.nrows() {
                        return Err(BackendError::Eval(format!(
                            "op {}: cannot multiply {} columns by a {}-row matrix",
                            i,
                            h.ncols(),
                            w.nrows()
                        )));
                    }
                    h = h.dot(w);
                }
                Op::BiasAdd(b) => {
                    if h.ncols() != b.len() {
                        return Err(BackendError::Eval(format!(
                            "op {}: bias length {} does not match {} columns",
                            i,
                            b.len(),
                            h.ncols()
                        )));
                    }
                    h += b;
                }
                Op::Relu => h.mapv_inplace(|v| v.max(0.0)),
                Op::Sigmoid => h.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
                Op::Softmax => {
                    for mut row in h.axis_iter_mut(Axis(0)) {
                        let max = row.fold(f64::NEG_INFINITY, |m, v| m.max(*v));
                        row.mapv_inplace(|v| (v - max).exp());
                        let sum = row.sum();
                        if sum > 0.0 {
                            row.mapv_inplace(|v| v / sum);
                        }
                    }
                }
                Op::Scale(factor) => h.mapv_inplace(|v| v * factor),
            }
        }
        Ok(h)
    }
}

impl PredictionOracle for TensorModule {
    fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
        let rows = tensor::flatten_rows(batch).map_err(|e| BackendError::Eval(e.to_string()))?;
        let out = self.module_predict(&rows)?;
        if out.ncols() == 1 {
            Ok(out.column(0).to_owned().into_dyn())
        } else {
            Ok(out.into_dyn())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_op_pipeline() {
        let bytes = br#"{
            "ops": [
                {"op": "mat_mul", "weights": [[1.0, 0.0], [0.0, 1.0]]},
                {"op": "bias_add", "bias": [1.0, -1.0]},
                {"op": "relu"},
                {"op": "softmax"}
            ]
        }"#;
        let module = TensorModule::load(bytes).unwrap();
        let out = module
            .predict(&arr2(&[[0.0, 0.0], [2.0, 2.0]]).into_dyn())
            .unwrap();
        assert_eq!(out.shape(), &[2, 2]);
    }

    #[test]
    fn test_single_column_squeezes_to_vector() {
        let bytes = br#"{
            "ops": [
                {"op": "mat_mul", "weights": [[0.5], [0.5]]},
                {"op": "scale", "factor": 2.0}
            ]
        }"#;
        let module = TensorModule::load(bytes).unwrap();
        let out = module.predict(&arr2(&[[1.0, 3.0]]).into_dyn()).unwrap();
        assert_eq!(out.shape(), &[1]);
        assert!((out[[0]] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch_is_eval_error() {
        let bytes = br#"{
            "ops": [{"op": "mat_mul", "weights": [[1.0]]}]
        }"#;
        let module = TensorModule::load(bytes).unwrap();
        assert!(matches!(
            module.predict(&arr2(&[[1.0, 2.0]]).into_dyn()),
            Err(BackendError::Eval(_))
        ));
    }
}
