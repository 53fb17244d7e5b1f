//! # Estimator-Based Models
//!
//! Fitted estimators serialized with their learned parameters: linear models
//! and decision-tree ensembles. The oracle uses the class-probability method
//! when the estimator is a classifier, and the direct predict method
//! otherwise.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Deserialize;

use crate::tensor::{self, Tensor};

use super::errors::{BackendError, BackendResult};
use super::oracle::PredictionOracle;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TaskSpec {
    Classification { classes: usize },
    Regression,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub(crate) enum NodeSpec {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct TreeSpec {
    nodes: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub(crate) enum EstimatorSpec {
    Linear {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
        task: TaskSpec,
    },
    TreeEnsemble {
        trees: Vec<TreeSpec>,
        task: TaskSpec,
    },
}

/// Prediction task of a fitted estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Classification { classes: usize },
    Regression,
}

#[derive(Debug)]
enum Kind {
    Linear {
        weights: Array2<f64>, // features x outputs
        intercepts: Array1<f64>,
    },
    Trees {
        trees: Vec<TreeSpec>,
    },
}

/// A loaded fitted estimator
#[derive(Debug)]
pub struct Estimator {
    kind: Kind,
    task: Task,
}

impl Estimator {
    /// Deserialize an estimator artifact
    pub fn load(bytes: &[u8]) -> BackendResult<Self> {
        let spec: EstimatorSpec = serde_json::from_slice(bytes)
            .map_err(|e| BackendError::load("estimator", e.to_string()))?;
        Self::from_spec(spec)
    }

    pub(crate) fn from_spec(spec: EstimatorSpec) -> BackendResult<Self> {
        match spec {
            EstimatorSpec::Linear {
                coefficients,
                intercepts,
                task,
            } => {
                let d = coefficients.len();
                let m = coefficients.first().map(Vec::len).unwrap_or(0);
                if d == 0 || m == 0 {
                    return Err(BackendError::load("estimator", "empty coefficient matrix"));
                }
                if coefficients.iter().any(|row| row.len() != m) {
                    return Err(BackendError::load("estimator", "ragged coefficient matrix"));
                }
                if intercepts.len() != m {
                    return Err(BackendError::load(
                        "estimator",
                        format!("{} intercepts for {} outputs", intercepts.len(), m),
                    ));
                }
                let task = resolve_task(task, m)?;
                let flat: Vec<f64> = coefficients.into_iter().flatten().collect();
                let weights = Array2::from_shape_vec((d, m), flat)
                    .map_err(|e| BackendError::load("estimator", e.to_string()))?;
                Ok(Self {
                    kind: Kind::Linear {
                        weights,
                        intercepts: Array1::from_vec(intercepts),
                    },
                    task,
                })
            }
            EstimatorSpec::TreeEnsemble { trees, task } => {
                if trees.is_empty() {
                    return Err(BackendError::load("estimator", "ensemble has no trees"));
                }
                let task = match task {
                    TaskSpec::Classification { classes } if classes < 2 => {
                        return Err(BackendError::load(
                            "estimator",
                            "a classifier needs at least two classes",
                        ));
                    }
                    TaskSpec::Classification { classes } => Task::Classification { classes },
                    TaskSpec::Regression => Task::Regression,
                };
                for (t, tree) in trees.iter().enumerate() {
                    validate_tree(tree, t, &task)?;
                }
                Ok(Self {
                    kind: Kind::Trees { trees },
                    task,
                })
            }
        }
    }

    /// Prediction task of this estimator
    pub fn task(&self) -> Task {
        self.task
    }

    /// Whether this estimator produces class probabilities
    pub fn is_classifier(&self) -> bool {
        matches!(self.task, Task::Classification { .. })
    }

    /// Whether the underlying model is tree-structured
    pub fn is_tree_based(&self) -> bool {
        matches!(self.kind, Kind::Trees { .. })
    }

    /// Per-class probabilities (classifiers only), N x K
    pub fn predict_proba(&self, rows: &Array2<f64>) -> BackendResult<Array2<f64>> {
        let classes = match self.task {
            Task::Classification { classes } => classes,
            Task::Regression => {
                return Err(BackendError::Eval(
                    "a regression estimator has no class probabilities".to_string(),
                ));
            }
        };
        match &self.kind {
            Kind::Linear {
                weights,
                intercepts,
            } => {
                let mut logits = rows.dot(weights);
                logits += intercepts;
                if weights.ncols() == 1 && classes == 2 {
                    // Binary model with a single logit column
                    let mut proba = Array2::zeros((rows.nrows(), 2));
                    for (i, logit) in logits.column(0).iter().enumerate() {
                        let p = 1.0 / (1.0 + (-logit).exp());
                        proba[[i, 0]] = 1.0 - p;
                        proba[[i, 1]] = p;
                    }
                    Ok(proba)
                } else {
                    softmax_rows(&mut logits);
                    Ok(logits)
                }
            }
            Kind::Trees { trees } => {
                let mut proba = Array2::zeros((rows.nrows(), classes));
                for (i, row) in rows.axis_iter(Axis(0)).enumerate() {
                    for tree in trees {
                        let leaf = eval_tree(tree, row)?;
                        for (k, v) in leaf.iter().enumerate() {
                            proba[[i, k]] += v;
                        }
                    }
                }
                proba.mapv_inplace(|v| v / trees.len() as f64);
                Ok(proba)
            }
        }
    }

    /// Direct predictions: class labels for classifiers, values for regressors
    pub fn predict_values(&self, rows: &Array2<f64>) -> BackendResult<Array1<f64>> {
        match self.task {
            Task::Classification { .. } => {
                let proba = self.predict_proba(rows)?;
                Ok(Array1::from_iter(
                    proba
                        .axis_iter(Axis(0))
                        .map(|row| tensor::argmax(&row) as f64),
                ))
            }
            Task::Regression => match &self.kind {
                Kind::Linear {
                    weights,
                    intercepts,
                } => {
                    let out = rows.dot(weights);
                    Ok(out.column(0).mapv(|v| v + intercepts[0]))
                }
                Kind::Trees { trees } => {
                    let mut values = Array1::zeros(rows.nrows());
                    for (i, row) in rows.axis_iter(Axis(0)).enumerate() {
                        let mut acc = 0.0;
                        for tree in trees {
                            acc += eval_tree(tree, row)?[0];
                        }
                        values[i] = acc / trees.len() as f64;
                    }
                    Ok(values)
                }
            },
        }
    }
}

fn resolve_task(task: TaskSpec, outputs: usize) -> BackendResult<Task> {
    match task {
        TaskSpec::Classification { classes } => {
            if classes < 2 {
                return Err(BackendError::load(
                    "estimator",
                    "a classifier needs at least two classes",
                ));
            }
            if outputs != classes && !(outputs == 1 && classes == 2) {
                return Err(BackendError::load(
                    "estimator",
                    format!("{} coefficient columns for {} classes", outputs, classes),
                ));
            }
            Ok(Task::Classification { classes })
        }
        TaskSpec::Regression => {
            if outputs != 1 {
                return Err(BackendError::load(
                    "estimator",
                    "a regression model must have exactly one output column",
                ));
            }
            Ok(Task::Regression)
        }
    }
}

fn validate_tree(tree: &TreeSpec, index: usize, task: &Task) -> BackendResult<()> {
    if tree.nodes.is_empty() {
        return Err(BackendError::load(
            "estimator",
            format!("tree {} has no nodes", index),
        ));
    }
    for node in &tree.nodes {
        match node {
            NodeSpec::Split { left, right, .. } => {
                if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                    return Err(BackendError::load(
                        "estimator",
                        format!("tree {} has a child index out of range", index),
                    ));
                }
            }
            NodeSpec::Leaf { value } => {
                let expected = match task {
                    Task::Classification { classes } => *classes,
                    Task::Regression => 1,
                };
                if value.len() != expected {
                    return Err(BackendError::load(
                        "estimator",
                        format!(
                            "tree {} leaf carries {} values, expected {}",
                            index,
                            value.len(),
                            expected
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn eval_tree<'t>(tree: &'t TreeSpec, row: ArrayView1<'_, f64>) -> BackendResult<&'t [f64]> {
    let mut idx = 0usize;
    for _ in 0..=tree.nodes.len() {
        match &tree.nodes[idx] {
            NodeSpec::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let v = row.get(*feature).copied().ok_or_else(|| {
                    BackendError::Eval(format!("tree split on missing feature {}", feature))
                })?;
                idx = if v <= *threshold { *left } else { *right };
            }
            NodeSpec::Leaf { value } => return Ok(value),
        }
    }
    Err(BackendError::Eval(
        "tree traversal did not terminate".to_string(),
    ))
}

fn softmax_rows(h: &mut Array2<f64>) {
    for mut row in h.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, v| m.max(*v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

impl PredictionOracle for Estimator {
    fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
        let rows = tensor::flatten_rows(batch).map_err(|e| BackendError::Eval(e.to_string()))?;
        if self.is_classifier() {
            Ok(self.predict_proba(&rows)?.into_dyn())
        } else {
            Ok(self.predict_values(&rows)?.into_dyn())
        }
    }
}
