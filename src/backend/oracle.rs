//! # Prediction Oracle
//!
//! The one calling convention every explanation algorithm sees, regardless
//! of how the underlying model is stored or where it runs.

use crate::tensor::Tensor;

use super::errors::BackendResult;

/// A black-box batched prediction function.
///
/// Input is a batch of N instances (N x D features, or N images in their
/// native shape); output is N x K class scores or N regression values, in
/// input row order. Local oracles are immutable and side-effect-free once
/// constructed; the remote adapter makes no idempotence promise under
/// transport failure.
pub trait PredictionOracle: Send {
    fn predict(&self, batch: &Tensor) -> BackendResult<Tensor>;
}

impl PredictionOracle for Box<dyn PredictionOracle> {
    fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
        (**self).predict(batch)
    }
}
