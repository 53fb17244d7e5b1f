//! # Explanation Requests
//!
//! Per-method request and parameter structs. Every optional parameter is a
//! named field with a documented default; absence is an `Option`, never a
//! missing dictionary key.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::tensor::Tensor;

fn default_output_index() -> usize {
    1
}

/// Parameters of the kernel Shapley method
#[derive(Debug, Clone, Deserialize)]
pub struct ShapParams {
    /// Index of the class to explain on multi-class results; ignored for
    /// regression models
    #[serde(default = "default_output_index")]
    pub output_index: usize,

    /// Chart form: bar, decision, force, or waterfall (the default)
    #[serde(default)]
    pub plot_type: Option<String>,

    /// Feature permutations sampled by the estimator
    #[serde(default)]
    pub samples: Option<usize>,
}

impl Default for ShapParams {
    fn default() -> Self {
        Self {
            output_index: default_output_index(),
            plot_type: None,
            samples: None,
        }
    }
}

/// Kernel Shapley request: a stored model (or prediction URL) and one
/// instance to explain
#[derive(Debug, Deserialize)]
pub struct ShapKernelRequest {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub instance: Vec<f64>,
    #[serde(default)]
    pub params: ShapParams,
}

/// Parameters of the tree Shapley method
#[derive(Debug, Clone, Deserialize)]
pub struct TreeParams {
    /// Index of the class to explain on multi-class results
    #[serde(default = "default_output_index")]
    pub output_index: usize,

    /// Feature permutations sampled per dataset row
    #[serde(default)]
    pub samples: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            output_index: default_output_index(),
            samples: None,
        }
    }
}

/// Tree Shapley request: a stored tree model, explained over its own
/// reference dataset
#[derive(Debug, Deserialize)]
pub struct ShapTreeRequest {
    pub id: String,
    #[serde(default)]
    pub params: TreeParams,
}

/// Parameters of the image counterfactual method
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CounterfactualParams {
    /// Image matrix, used when no image file was uploaded
    #[serde(default)]
    pub image: Option<Value>,

    /// "other", "same", or a class index; defaults to "other"
    #[serde(default)]
    pub target_class: Option<Value>,

    /// Minimum probability the counterfactual must reach
    #[serde(default)]
    pub target_proba: Option<f64>,
}

/// Image counterfactual request, assembled by the multipart handler
#[derive(Debug, Default)]
pub struct CounterfactualImageRequest {
    pub id: String,
    pub url: Option<String>,
    /// Decoded uploaded image, if a file was attached
    pub image: Option<Tensor>,
    pub params: CounterfactualParams,
}

/// Parameters of the schema-only counterfactual method
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaCounterfactualParams {
    /// Desired counterfactual class: an index, or "opposite" for binary
    /// models; defaults to class 1
    #[serde(default)]
    pub desired_class: Option<Value>,

    /// "all" (the default) or an explicit list of feature names
    #[serde(default)]
    pub features_to_vary: Option<Value>,

    /// Counterfactuals generated per instance; defaults to 3
    #[serde(default)]
    pub num_cfs: Option<usize>,

    /// "random" (the default) or "genetic"
    #[serde(default)]
    pub method: Option<String>,

    /// Per-feature precision overrides: "int", or ["float", precision]
    #[serde(default)]
    pub type_and_precision: Option<HashMap<String, Value>>,
}

/// Schema-only counterfactual request
#[derive(Debug, Deserialize)]
pub struct SchemaCounterfactualRequest {
    pub id: String,
    /// Feature values, optionally followed by the target value
    pub instance: Vec<f64>,
    #[serde(default)]
    pub params: SchemaCounterfactualParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_index_defaults_to_one() {
        let params: ShapParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.output_index, 1);
        assert!(params.plot_type.is_none());
    }

    #[test]
    fn test_request_with_explicit_params() {
        let request: ShapKernelRequest = serde_json::from_str(
            r#"{
                "id": "iris",
                "instance": [5.1, 3.5, 1.4, 0.2],
                "params": {"output_index": 0, "plot_type": "force"}
            }"#,
        )
        .unwrap();
        assert_eq!(request.params.output_index, 0);
        assert_eq!(request.params.plot_type.as_deref(), Some("force"));
        assert!(request.url.is_none());
    }

    #[test]
    fn test_schema_params_accept_mixed_value_shapes() {
        let params: SchemaCounterfactualParams = serde_json::from_str(
            r#"{
                "desired_class": "opposite",
                "features_to_vary": ["Height"],
                "type_and_precision": {"Height": ["float", 1], "Weight": "int"}
            }"#,
        )
        .unwrap();
        assert!(params.desired_class.is_some());
        assert!(params.type_and_precision.unwrap().contains_key("Weight"));
    }
}
