//! # Explanation Orchestration
//!
//! One orchestrator per explanation method, each a state-free invocation:
//! resolve the model entry, build the uniform prediction oracle, invoke the
//! algorithm collaborator, normalize the output shape, then hand the result
//! to the assembler, which persists the artifacts and builds the response
//! body. Nothing is cached or shared across requests.

pub mod counterfactual_image;
pub mod errors;
pub mod plot;
pub mod request;
pub mod schema_counterfactual;
pub mod shap_kernel;
pub mod shap_tree;

use ndarray::{Array2, ArrayD, Axis};
use serde_json::Value;

use crate::artifact::{self, ArtifactRecord, ArtifactStore, LocalBackend, MimeKind};
use crate::backend::{self, Estimator};
use crate::render::{self, ChartKind};
use crate::repository::{BackendKind, ModelRepository};
use crate::tensor::{self, Tensor};

pub use errors::{ExplainError, ExplainResult};
pub use request::{
    CounterfactualImageRequest, CounterfactualParams, SchemaCounterfactualParams,
    SchemaCounterfactualRequest, ShapKernelRequest, ShapParams, ShapTreeRequest, TreeParams,
};

/// Rendering instructions produced by an orchestrator
#[derive(Debug)]
pub enum RenderPlan {
    /// One attribution vector in the selected chart form
    Attribution {
        kind: ChartKind,
        expected: f64,
        values: Vec<f64>,
    },
    /// Dataset-wide attribution summary over an instances x features matrix
    Summary { values: Array2<f64> },
    /// A counterfactual (or original) image raster, H x W x C
    CounterfactualImage { image: Tensor },
    /// Counterfactual table: HTML artifact plus a comparison chart
    CounterfactualTable {
        html: String,
        instance: Vec<f64>,
        counterfactuals: Vec<Vec<f64>>,
    },
}

/// A produced explanation, before and after artifact persistence
#[derive(Debug)]
pub struct ExplanationResult {
    /// Method-specific JSON-serializable payload
    pub payload: Value,
    /// What to render
    pub render: RenderPlan,
    /// Persisted artifacts; empty until the assembler runs, then filled
    /// exactly once
    pub artifacts: Vec<ArtifactRecord>,
}

/// Unified multi-class slice rule: when the result rank exceeds the
/// single-output rank, the leading axis is the class axis - select the slice
/// at `output_index` for both the values and the expected baseline.
pub(crate) fn select_class_slice(
    values: &ArrayD<f64>,
    expected: &[f64],
    single_rank: usize,
    output_index: usize,
) -> ExplainResult<(ArrayD<f64>, f64)> {
    if values.ndim() <= single_rank {
        Ok((values.clone(), expected.first().copied().unwrap_or(0.0)))
    } else {
        let outputs = values.shape()[0];
        if output_index >= outputs {
            return Err(ExplainError::OutputIndexOutOfRange {
                index: output_index,
                outputs,
            });
        }
        Ok((
            values.index_axis(Axis(0), output_index).to_owned(),
            expected[output_index],
        ))
    }
}

/// The explanation service: repository access, orchestration, and artifact
/// assembly behind one request-scoped call per method
#[derive(Debug)]
pub struct ExplainService {
    repository: ModelRepository,
    artifacts: ArtifactStore<LocalBackend>,
}

impl ExplainService {
    pub fn new(repository: ModelRepository, artifacts: ArtifactStore<LocalBackend>) -> Self {
        Self {
            repository,
            artifacts,
        }
    }

    /// The artifact store, for serving stored artifacts back
    pub fn artifacts(&self) -> &ArtifactStore<LocalBackend> {
        &self.artifacts
    }

    /// Kernel Shapley attribution for one tabular instance
    pub fn shap_kernel(
        &self,
        request: &ShapKernelRequest,
        request_path: &str,
    ) -> ExplainResult<Value> {
        let entry = self.repository.fetch(&request.id)?;
        let oracle = backend::resolve_oracle(
            entry.model.as_deref(),
            request.url.as_deref(),
            &entry.descriptor,
        )?;
        let reference = entry.reference.as_ref().ok_or_else(|| {
            ExplainError::Configuration(
                "the reference dataset was not provided for this model".to_string(),
            )
        })?;
        let matrix = reference.feature_matrix()?;
        if request.instance.len() != matrix.ncols() {
            return Err(ExplainError::Configuration(format!(
                "instance has {} values but the reference data has {} feature columns",
                request.instance.len(),
                matrix.ncols()
            )));
        }
        let instance = ndarray::Array1::from_vec(request.instance.clone());

        let mut result =
            shap_kernel::orchestrate(&*oracle, &matrix, &instance, &request.params)?;
        self.assemble(request_path, &mut result)
    }

    /// Tree Shapley attribution over the model's whole reference dataset
    pub fn shap_tree(
        &self,
        request: &ShapTreeRequest,
        request_path: &str,
    ) -> ExplainResult<Value> {
        let entry = self.repository.fetch(&request.id)?;
        if entry.descriptor.backend != Some(BackendKind::Estimator) {
            return Err(ExplainError::Configuration(
                "tree attribution requires an estimator-backed model".to_string(),
            ));
        }
        let bytes = entry.model.as_deref().ok_or_else(|| {
            ExplainError::Configuration(
                "a stored model artifact is required for tree attribution".to_string(),
            )
        })?;
        let estimator = Estimator::load(bytes)?;
        if !estimator.is_tree_based() {
            return Err(ExplainError::Configuration(
                "tree attribution requires a tree-structured estimator".to_string(),
            ));
        }
        let reference = entry.reference.as_ref().ok_or_else(|| {
            ExplainError::Configuration(
                "the reference dataset was not provided for this model".to_string(),
            )
        })?;
        let matrix = reference.feature_matrix()?;

        let mut result = shap_tree::orchestrate(&estimator, &matrix, &request.params)?;
        self.assemble(request_path, &mut result)
    }

    /// Counterfactual search on an image instance
    pub fn counterfactual_image(
        &self,
        request: &CounterfactualImageRequest,
        request_path: &str,
    ) -> ExplainResult<Value> {
        let entry = self.repository.fetch(&request.id)?;
        let oracle = backend::resolve_oracle(
            entry.model.as_deref(),
            request.url.as_deref(),
            &entry.descriptor,
        )?;

        let image: Tensor = match &request.image {
            Some(uploaded) => uploaded.clone(),
            None => match &request.params.image {
                Some(matrix) => tensor::from_json(matrix).map_err(|e| {
                    ExplainError::Configuration(format!("invalid image matrix: {}", e))
                })?,
                None => {
                    return Err(ExplainError::Configuration(
                        "either an image file or a matrix representing the image must be provided"
                            .to_string(),
                    ));
                }
            },
        };

        let mut result = counterfactual_image::orchestrate(
            &*oracle,
            image,
            &request.params,
            &entry.descriptor,
        )?;
        self.assemble(request_path, &mut result)
    }

    /// Schema-only counterfactual generation, no real training data
    pub fn schema_counterfactuals(
        &self,
        request: &SchemaCounterfactualRequest,
        request_path: &str,
    ) -> ExplainResult<Value> {
        let entry = self.repository.fetch(&request.id)?;
        if entry.descriptor.backend != Some(BackendKind::Graph) {
            return Err(ExplainError::Configuration(
                "only graph-backed models are supported for schema-only counterfactual generation"
                    .to_string(),
            ));
        }
        let bytes = entry.model.as_deref().ok_or_else(|| {
            ExplainError::Configuration(
                "a stored model artifact is required for counterfactual generation".to_string(),
            )
        })?;
        let oracle = crate::backend::GraphModel::load(bytes)?;

        let mut result = schema_counterfactual::orchestrate(
            &oracle,
            &request.instance,
            &entry.descriptor,
            &request.params,
        )?;
        self.assemble(request_path, &mut result)
    }

    /// Persist the result's artifacts and build the response body. Artifact
    /// records are attached to the result exactly once, here.
    fn assemble(&self, request_path: &str, result: &mut ExplanationResult) -> ExplainResult<Value> {
        let slot = self.artifacts.allocate(request_path);

        let png = match &result.render {
            RenderPlan::Attribution {
                kind,
                expected,
                values,
            } => render::attribution_chart(*kind, *expected, values)?,
            RenderPlan::Summary { values } => render::summary_chart(values)?,
            RenderPlan::CounterfactualImage { image } => render::raster_image(image)?,
            RenderPlan::CounterfactualTable {
                instance,
                counterfactuals,
                ..
            } => render::comparison_chart(instance, counterfactuals)?,
        };
        let png_record = self.artifacts.persist(&slot, MimeKind::Png, &png)?;

        let mut body = serde_json::Map::new();
        body.insert(
            "plot_png".to_string(),
            Value::String(png_record.public_url.clone()),
        );
        result.artifacts.push(png_record);

        if let RenderPlan::CounterfactualTable { html, .. } = &result.render {
            let html_record = self.artifacts.persist(&slot, MimeKind::Html, html.as_bytes())?;
            body.insert(
                "plot_html".to_string(),
                Value::String(html_record.public_url.clone()),
            );
            result.artifacts.push(html_record);
        }

        body.insert("explanation".to_string(), artifact::canonical(&result.payload)?);
        Ok(Value::Object(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_single_output_passes_through() {
        let values = ArrayD::from_shape_vec(IxDyn(&[3]), vec![0.1, 0.2, 0.3]).unwrap();
        let (selected, expected) = select_class_slice(&values, &[0.5], 1, 1).unwrap();
        assert_eq!(selected.shape(), &[3]);
        assert_eq!(expected, 0.5);
    }

    #[test]
    fn test_multi_class_selects_slice() {
        let values =
            ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
        let (selected, expected) = select_class_slice(&values, &[0.25, 0.75], 1, 1).unwrap();
        assert_eq!(selected.shape(), &[3]);
        assert_eq!(selected[[0]], 0.4);
        assert_eq!(expected, 0.75);
    }

    #[test]
    fn test_out_of_range_index_is_defined_error() {
        let values =
            ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
        let err = select_class_slice(&values, &[0.25, 0.75], 1, 2).unwrap_err();
        assert!(matches!(
            err,
            ExplainError::OutputIndexOutOfRange {
                index: 2,
                outputs: 2
            }
        ));
    }

    #[test]
    fn test_dataset_rank_uses_same_rule() {
        let values = ArrayD::zeros(IxDyn(&[2, 4, 3]));
        let (selected, _) = select_class_slice(&values, &[0.1, 0.9], 2, 1).unwrap();
        assert_eq!(selected.shape(), &[4, 3]);

        let flat = ArrayD::zeros(IxDyn(&[4, 3]));
        let (selected, _) = select_class_slice(&flat, &[0.1], 2, 1).unwrap();
        assert_eq!(selected.shape(), &[4, 3]);
    }
}
