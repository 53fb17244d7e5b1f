//! # Kernel Shapley Orchestrator
//!
//! Explains one tabular instance: invokes the sampling Shapley estimator
//! against the reference dataset, applies the multi-class slice rule, and
//! selects the chart form.

use ndarray::{Array1, Array2};

use crate::algorithms::shapley::{self, ShapleyConfig};
use crate::algorithms::DEFAULT_SEED;
use crate::backend::PredictionOracle;
use crate::tensor;

use super::errors::ExplainResult;
use super::plot::resolve_plot_type;
use super::request::ShapParams;
use super::{select_class_slice, ExplanationResult, RenderPlan};

/// Default feature permutations for a single instance
const DEFAULT_SAMPLES: usize = 64;

pub fn orchestrate(
    oracle: &dyn PredictionOracle,
    reference: &Array2<f64>,
    instance: &Array1<f64>,
    params: &ShapParams,
) -> ExplainResult<ExplanationResult> {
    let config = ShapleyConfig {
        permutations: params.samples.unwrap_or(DEFAULT_SAMPLES),
        seed: DEFAULT_SEED,
    };
    let estimate = shapley::explain_instance(oracle, reference, instance, &config)?;

    let (selected, expected) =
        select_class_slice(&estimate.values, &estimate.expected, 1, params.output_index)?;
    let values: Vec<f64> = selected.iter().copied().collect();
    let kind = resolve_plot_type(params.plot_type.as_deref());

    Ok(ExplanationResult {
        payload: tensor::to_json(&selected),
        render: RenderPlan::Attribution {
            kind,
            expected,
            values,
        },
        artifacts: Vec::new(),
    })
}
