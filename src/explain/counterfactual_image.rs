//! # Image Counterfactual Orchestrator
//!
//! Normalizes the image shape (trailing channel axis for grayscale, leading
//! batch axis), invokes the counterfactual search, and formats the title
//! string with semantic output names when the descriptor carries them. A
//! search that finds nothing degrades to an explicit notice, never an error.

use serde_json::{json, Value};

use crate::algorithms::counterfactual::{self, CounterfactualConfig, TargetClass};
use crate::backend::PredictionOracle;
use crate::repository::ModelDescriptor;
use crate::tensor::{self, Tensor};

use super::errors::{ExplainError, ExplainResult};
use super::request::CounterfactualParams;
use super::{ExplanationResult, RenderPlan};

pub fn orchestrate(
    oracle: &dyn PredictionOracle,
    image: Tensor,
    params: &CounterfactualParams,
    descriptor: &ModelDescriptor,
) -> ExplainResult<ExplanationResult> {
    let image = tensor::ensure_channel_axis(image);
    let batched = tensor::with_batch_axis(image.clone());

    let config = CounterfactualConfig {
        target_class: parse_target_class(params.target_class.as_ref())?,
        target_proba: params.target_proba,
        ..CounterfactualConfig::default()
    };
    let outcome = counterfactual::search(oracle, &batched, &config)?;

    let original_label = descriptor.output_label(outcome.original_class);
    match outcome.result {
        Some(found) => {
            let probability = found.probabilities.get(found.class).copied().unwrap_or(0.0);
            let title = format!(
                "Original Class: {}\nCounterfactual Class: {}\nProbability {:.3}",
                original_label,
                descriptor.output_label(found.class),
                probability
            );
            let raster = found.instance.index_axis(ndarray::Axis(0), 0).to_owned();
            Ok(ExplanationResult {
                payload: json!({
                    "cf": {
                        "X": tensor::to_json(&found.instance),
                        "class": found.class,
                        "proba": found.probabilities,
                    },
                    "orig_class": outcome.original_class,
                    "orig_proba": outcome.original_probabilities,
                    "title": title,
                }),
                render: RenderPlan::CounterfactualImage { image: raster },
                artifacts: Vec::new(),
            })
        }
        None => Ok(ExplanationResult {
            payload: json!({
                "cf": Value::Null,
                "orig_class": outcome.original_class,
                "orig_proba": outcome.original_probabilities,
                "notice": "No counterfactual satisfying the target constraint was found \
                           within the search budget.",
            }),
            render: RenderPlan::CounterfactualImage { image },
            artifacts: Vec::new(),
        }),
    }
}

/// Parse the target class parameter: "other", "same", or a class index
fn parse_target_class(value: Option<&Value>) -> ExplainResult<TargetClass> {
    match value {
        None => Ok(TargetClass::Other),
        Some(Value::String(s)) => match s.as_str() {
            "other" => Ok(TargetClass::Other),
            "same" => Ok(TargetClass::Same),
            other => Err(ExplainError::Configuration(format!(
                "target_class must be 'other', 'same', or a class index, got '{}'",
                other
            ))),
        },
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|i| TargetClass::Index(i as usize))
            .ok_or_else(|| {
                ExplainError::Configuration(
                    "target_class index must be a non-negative integer".to_string(),
                )
            }),
        Some(other) => Err(ExplainError::Configuration(format!(
            "target_class must be 'other', 'same', or a class index, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResult;
    use ndarray::{Array2, Axis, IxDyn};

    /// Classifies by mean pixel intensity: bright is class 1
    struct BrightnessOracle;

    impl PredictionOracle for BrightnessOracle {
        fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
            let rows = crate::tensor::flatten_rows(batch).unwrap();
            let n = rows.nrows();
            let mut out = Array2::zeros((n, 2));
            for (i, row) in rows.axis_iter(Axis(0)).enumerate() {
                let mean = row.sum() / row.len() as f64;
                let p1 = 1.0 / (1.0 + (-10.0 * (mean - 0.5)).exp());
                out[[i, 0]] = 1.0 - p1;
                out[[i, 1]] = p1;
            }
            Ok(out.into_dyn())
        }
    }

    fn descriptor_with_names() -> ModelDescriptor {
        serde_json::from_str(r#"{"output_names": ["dark", "bright"]}"#).unwrap()
    }

    #[test]
    fn test_grayscale_image_is_normalized_before_search() {
        // Rank-2 input: gains a channel axis, then a batch axis
        let image = ndarray::ArrayD::from_elem(IxDyn(&[3, 3]), 0.1);
        let result = orchestrate(
            &BrightnessOracle,
            image,
            &CounterfactualParams::default(),
            &descriptor_with_names(),
        )
        .unwrap();
        let cf = &result.payload["cf"];
        assert!(!cf.is_null());
        // Batched counterfactual keeps the normalized shape
        assert_eq!(cf["X"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_title_uses_output_names() {
        let image = ndarray::ArrayD::from_elem(IxDyn(&[3, 3, 1]), 0.1);
        let result = orchestrate(
            &BrightnessOracle,
            image,
            &CounterfactualParams::default(),
            &descriptor_with_names(),
        )
        .unwrap();
        let title = result.payload["title"].as_str().unwrap();
        assert!(title.contains("Original Class: dark"));
        assert!(title.contains("Counterfactual Class: bright"));
    }

    #[test]
    fn test_title_falls_back_to_indices() {
        let image = ndarray::ArrayD::from_elem(IxDyn(&[3, 3, 1]), 0.1);
        let bare: ModelDescriptor = serde_json::from_str("{}").unwrap();
        let result = orchestrate(
            &BrightnessOracle,
            image,
            &CounterfactualParams::default(),
            &bare,
        )
        .unwrap();
        let title = result.payload["title"].as_str().unwrap();
        assert!(title.contains("Original Class: 0"));
    }

    #[test]
    fn test_unreachable_target_degrades_to_notice() {
        let image = ndarray::ArrayD::from_elem(IxDyn(&[3, 3, 1]), 0.1);
        let params = CounterfactualParams {
            target_proba: Some(2.0), // no probability can reach this
            ..CounterfactualParams::default()
        };
        let result = orchestrate(
            &BrightnessOracle,
            image,
            &params,
            &descriptor_with_names(),
        )
        .unwrap();
        assert!(result.payload["cf"].is_null());
        assert!(result.payload["notice"].as_str().is_some());
        assert!(matches!(
            result.render,
            RenderPlan::CounterfactualImage { .. }
        ));
    }

    #[test]
    fn test_invalid_target_class_rejected() {
        assert!(matches!(
            parse_target_class(Some(&serde_json::json!("sideways"))),
            Err(ExplainError::Configuration(_))
        ));
        assert!(matches!(
            parse_target_class(Some(&serde_json::json!(1))),
            Ok(TargetClass::Index(1))
        ));
    }
}
