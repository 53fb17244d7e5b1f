//! # Numeric Tensors
//!
//! Conversion between JSON-encoded nested arrays and `ndarray` tensors, plus
//! the shape normalization every oracle call path relies on: grayscale images
//! gain a trailing channel axis, and single instances gain a leading batch
//! axis before prediction.

use ndarray::{ArrayD, Axis, Ix1, Ix2, IxDyn};
use serde_json::Value;
use thiserror::Error;

/// The uniform numeric batch type passed to prediction oracles
pub type Tensor = ArrayD<f64>;

/// Result type for tensor conversions
pub type TensorResult<T> = Result<T, TensorError>;

/// Tensor conversion errors
#[derive(Debug, Clone, Error)]
pub enum TensorError {
    #[error("Expected a numeric array, found {0}")]
    NotNumeric(String),

    #[error("Ragged nested array: expected {expected} elements, found {found}")]
    Ragged { expected: usize, found: usize },

    #[error("Expected a rank-{expected} array, found rank {found}")]
    WrongRank { expected: usize, found: usize },
}

/// Parse a JSON value (number or arbitrarily nested array of numbers) into a
/// tensor. Ragged arrays are rejected.
pub fn from_json(value: &Value) -> TensorResult<Tensor> {
    let shape = probe_shape(value)?;
    let mut data = Vec::with_capacity(shape.iter().product());
    fill(value, &shape, &mut data)?;
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|_| TensorError::Ragged {
        expected: shape.iter().product(),
        found: 0,
    })
}

/// Encode a tensor as nested JSON arrays of numbers
pub fn to_json(tensor: &Tensor) -> Value {
    if tensor.ndim() == 0 {
        return json_number(tensor.iter().next().copied().unwrap_or(0.0));
    }
    if tensor.ndim() == 1 {
        return Value::Array(tensor.iter().map(|v| json_number(*v)).collect());
    }
    Value::Array(
        tensor
            .axis_iter(Axis(0))
            .map(|sub| to_json(&sub.to_owned()))
            .collect(),
    )
}

/// Add a trailing channel axis of size 1 to grayscale images (rank < 3)
pub fn ensure_channel_axis(tensor: Tensor) -> Tensor {
    if tensor.ndim() < 3 {
        let axis = Axis(tensor.ndim());
        tensor.insert_axis(axis)
    } else {
        tensor
    }
}

/// Add a leading batch axis of size 1
pub fn with_batch_axis(tensor: Tensor) -> Tensor {
    tensor.insert_axis(Axis(0))
}

/// View a tensor as a rank-2 matrix (N instances x D features)
pub fn as_matrix(tensor: &Tensor) -> TensorResult<ndarray::Array2<f64>> {
    tensor
        .clone()
        .into_dimensionality::<Ix2>()
        .map_err(|_| TensorError::WrongRank {
            expected: 2,
            found: tensor.ndim(),
        })
}

/// View a tensor as a rank-1 vector
pub fn as_vector(tensor: &Tensor) -> TensorResult<ndarray::Array1<f64>> {
    tensor
        .clone()
        .into_dimensionality::<Ix1>()
        .map_err(|_| TensorError::WrongRank {
            expected: 1,
            found: tensor.ndim(),
        })
}

/// Flatten every trailing axis of a batch into one feature axis,
/// yielding (N, D). Images become rows; matrices pass through.
pub fn flatten_rows(batch: &Tensor) -> TensorResult<ndarray::Array2<f64>> {
    if batch.ndim() == 0 {
        return Err(TensorError::WrongRank {
            expected: 2,
            found: 0,
        });
    }
    let n = batch.shape()[0];
    let d: usize = batch.shape()[1..].iter().product();
    let flat: Vec<f64> = batch.iter().copied().collect();
    ndarray::Array2::from_shape_vec((n, d), flat).map_err(|_| TensorError::Ragged {
        expected: n * d,
        found: 0,
    })
}

/// Index of the largest value in a row
pub fn argmax(row: &ndarray::ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in row.iter().enumerate() {
        if *v > best_value {
            best = i;
            best_value = *v;
        }
    }
    best
}

fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn probe_shape(value: &Value) -> TensorResult<Vec<usize>> {
    match value {
        Value::Array(items) => {
            let mut shape = vec![items.len()];
            if let Some(first) = items.first() {
                shape.extend(probe_shape(first)?);
            }
            Ok(shape)
        }
        Value::Number(_) => Ok(Vec::new()),
        other => Err(TensorError::NotNumeric(kind_name(other).to_string())),
    }
}

fn fill(value: &Value, shape: &[usize], out: &mut Vec<f64>) -> TensorResult<()> {
    match value {
        Value::Array(items) => {
            let expected = *shape.first().ok_or(TensorError::Ragged {
                expected: 0,
                found: items.len(),
            })?;
            if items.len() != expected {
                return Err(TensorError::Ragged {
                    expected,
                    found: items.len(),
                });
            }
            for item in items {
                fill(item, &shape[1..], out)?;
            }
            Ok(())
        }
        Value::Number(n) => {
            if !shape.is_empty() {
                return Err(TensorError::Ragged {
                    expected: shape[0],
                    found: 0,
                });
            }
            let v = n
                .as_f64()
                .ok_or_else(|| TensorError::NotNumeric("non-finite number".to_string()))?;
            out.push(v);
            Ok(())
        }
        other => Err(TensorError::NotNumeric(kind_name(other).to_string())),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
