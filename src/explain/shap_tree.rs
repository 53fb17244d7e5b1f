//! # Tree Shapley Orchestrator
//!
//! Dataset-wide attribution for tree-structured estimators: one attribution
//! matrix (instances x features) over the model's whole reference dataset,
//! under the same multi-class slice rule as the per-instance path.

use ndarray::Array2;

use crate::algorithms::shapley::{self, ShapleyConfig};
use crate::algorithms::DEFAULT_SEED;
use crate::backend::PredictionOracle;
use crate::tensor;

use super::errors::ExplainResult;
use super::request::TreeParams;
use super::{select_class_slice, ExplanationResult, RenderPlan};

/// Default feature permutations per dataset row; the dataset path evaluates
/// every row, so the per-row budget is kept smaller than the local path's
const DEFAULT_SAMPLES: usize = 16;

pub fn orchestrate(
    oracle: &dyn PredictionOracle,
    reference: &Array2<f64>,
    params: &TreeParams,
) -> ExplainResult<ExplanationResult> {
    let config = ShapleyConfig {
        permutations: params.samples.unwrap_or(DEFAULT_SAMPLES),
        seed: DEFAULT_SEED,
    };
    let estimate = shapley::explain_dataset(oracle, reference, reference, &config)?;

    let (selected, _expected) =
        select_class_slice(&estimate.values, &estimate.expected, 2, params.output_index)?;
    let matrix = tensor::as_matrix(&selected)
        .map_err(|e| crate::backend::BackendError::Eval(e.to_string()))?;

    Ok(ExplanationResult {
        payload: tensor::to_json(&selected),
        render: RenderPlan::Summary { values: matrix },
        artifacts: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendResult, Estimator};
    use crate::explain::ExplainError;
    use crate::tensor::Tensor;
    use ndarray::arr2;

    fn tree_classifier() -> Estimator {
        Estimator::load(
            br#"{
                "estimator": "tree_ensemble",
                "trees": [{"nodes": [
                    {"node": "split", "feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                    {"node": "leaf", "value": [0.9, 0.1]},
                    {"node": "leaf", "value": [0.2, 0.8]}
                ]}],
                "task": {"classification": {"classes": 2}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_matrix_shape_is_instances_by_features() {
        let reference = arr2(&[[0.0, 1.0], [1.0, 0.0], [0.3, 0.7]]);
        let result = orchestrate(&tree_classifier(), &reference, &TreeParams::default()).unwrap();
        match result.render {
            RenderPlan::Summary { values } => assert_eq!(values.dim(), (3, 2)),
            other => panic!("unexpected render plan: {:?}", other),
        }
        let payload = result.payload.as_array().expect("payload is an array");
        assert_eq!(payload.len(), 3);
        assert_eq!(payload[0].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_out_of_range_output_index_fails() {
        let reference = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        let params = TreeParams {
            output_index: 2,
            samples: Some(4),
        };
        let err = orchestrate(&tree_classifier(), &reference, &params).unwrap_err();
        assert!(matches!(
            err,
            ExplainError::OutputIndexOutOfRange { index: 2, outputs: 2 }
        ));
    }

    #[test]
    fn test_regression_output_skips_slice_selection() {
        /// Rank-1 output: no class axis, so the output index is irrelevant
        struct RegressionOracle;
        impl PredictionOracle for RegressionOracle {
            fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
                let rows = crate::tensor::flatten_rows(batch).unwrap();
                Ok(rows.map_axis(ndarray::Axis(1), |r| r.sum()).into_dyn())
            }
        }
        let reference = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        let result = orchestrate(&RegressionOracle, &reference, &TreeParams::default()).unwrap();
        match result.render {
            RenderPlan::Summary { values } => assert_eq!(values.dim(), (2, 2)),
            other => panic!("unexpected render plan: {:?}", other),
        }
    }
}
