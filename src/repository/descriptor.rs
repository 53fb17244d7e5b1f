//! # Model Descriptors
//!
//! The metadata record stored alongside every model. The descriptor is
//! immutable once resolved and owned by the request that resolved it.

use ndarray::Array2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{RepositoryError, RepositoryResult};

/// Declared serialization/runtime family of a stored model.
///
/// A closed set: new backends are added here and given an adapter, never by
/// string comparison at call sites. `Remote` is never stored; it is derived
/// at adapter-construction time when only a prediction URL is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Computation-graph model, invoked by direct forward pass
    Graph,
    /// Fitted estimator exposing predict / predict_proba
    Estimator,
    /// Tensor-computation module exposing predict
    TensorModule,
    /// No local artifact; predictions proxied through a remote scoring URL
    Remote,
    /// Generically serialized model; any unrecognized backend string lands here
    Generic,
}

impl BackendKind {
    /// Stable name used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Graph => "graph",
            BackendKind::Estimator => "estimator",
            BackendKind::TensorModule => "tensor-module",
            BackendKind::Remote => "remote",
            BackendKind::Generic => "generic",
        }
    }
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        // Unrecognized backend strings fall through to the generic adapter
        Ok(match name.as_str() {
            "graph" => BackendKind::Graph,
            "estimator" => BackendKind::Estimator,
            "tensor-module" => BackendKind::TensorModule,
            _ => BackendKind::Generic,
        })
    }
}

impl Serialize for BackendKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Value domain of a single schema feature, numerically coded
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDomain {
    /// Real-valued range; `precision` is the number of decimals to round to
    Continuous {
        min: f64,
        max: f64,
        #[serde(default)]
        precision: Option<u32>,
    },
    /// Finite set of admissible coded values
    Categorical { values: Vec<f64> },
}

/// One named feature of the declared data schema
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(flatten)]
    pub domain: FeatureDomain,
}

/// Metadata descriptor resolved per request (`info.json`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelDescriptor {
    /// Declared backend family; absent means generic when an artifact exists
    #[serde(default)]
    pub backend: Option<BackendKind>,

    /// Ordered feature names, used for labelling attributions
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,

    /// Ordered class names, used for labelling counterfactual titles
    #[serde(default)]
    pub output_names: Option<Vec<String>>,

    /// Name of the target column
    #[serde(default = "default_target_name")]
    pub target_name: String,

    /// Declared data schema; mandatory for schema-only counterfactual
    /// generation, unused elsewhere
    #[serde(default)]
    pub features: Option<Vec<FeatureSpec>>,
}

fn default_target_name() -> String {
    "Target".to_string()
}

impl ModelDescriptor {
    /// Feature names, falling back to "Feature i" for a D-feature instance
    pub fn feature_names_or_default(&self, d: usize) -> Vec<String> {
        match &self.feature_names {
            Some(names) if names.len() >= d => names[..d].to_vec(),
            _ => (0..d).map(|i| format!("Feature {}", i)).collect(),
        }
    }

    /// Human-readable label for a class index
    pub fn output_label(&self, class: usize) -> String {
        match &self.output_names {
            Some(names) if class < names.len() => names[class].clone(),
            _ => class.to_string(),
        }
    }
}

/// Serialized reference dataset: named columns, the last one being the target
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferenceDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl ReferenceDataset {
    /// Feature column names (target column dropped)
    pub fn feature_names(&self) -> Vec<String> {
        if self.columns.is_empty() {
            return Vec::new();
        }
        self.columns[..self.columns.len() - 1].to_vec()
    }

    /// Feature matrix with the target column dropped
    pub fn feature_matrix(&self) -> RepositoryResult<Array2<f64>> {
        if self.columns.len() < 2 {
            return Err(RepositoryError::DatasetInvalid(
                "dataset needs at least one feature column and a target column".to_string(),
            ));
        }
        let d = self.columns.len() - 1;
        let n = self.rows.len();
        let mut flat = Vec::with_capacity(n * d);
        for row in &self.rows {
            if row.len() != self.columns.len() {
                return Err(RepositoryError::DatasetInvalid(format!(
                    "row has {} values but {} columns are declared",
                    row.len(),
                    self.columns.len()
                )));
            }
            flat.extend_from_slice(&row[..d]);
        }
        Array2::from_shape_vec((n, d), flat)
            .map_err(|e| RepositoryError::DatasetInvalid(e.to_string()))
    }
}
