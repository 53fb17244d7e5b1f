//! # Sampling Shapley Estimator
//!
//! Model-agnostic Shapley-value attribution by permutation sampling: for a
//! random permutation of features, each feature's marginal contribution is
//! the prediction change when that feature flips from a reference value to
//! the instance value, averaged over every reference row. Averaging over
//! permutations yields the attribution vector; the per-output mean
//! prediction over the reference data is the baseline ("expected") value.
//! For linear models the estimate is exact for any permutation count.
//!
//! Multi-output models yield a (K x D) matrix; single-output models a (D,)
//! vector. Selecting the relevant output slice is the caller's concern.

use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::backend::{BackendError, BackendResult, PredictionOracle};

use super::DEFAULT_SEED;

/// Estimator configuration with documented defaults
#[derive(Debug, Clone)]
pub struct ShapleyConfig {
    /// Feature permutations sampled per explained instance
    pub permutations: usize,
    /// RNG seed; identical seeds give identical estimates
    pub seed: u64,
}

impl Default for ShapleyConfig {
    fn default() -> Self {
        Self {
            permutations: 64,
            seed: DEFAULT_SEED,
        }
    }
}

/// Attribution for a single instance
#[derive(Debug, Clone)]
pub struct ShapleyEstimate {
    /// (K x D) for multi-output models, (D,) for single-output models
    pub values: ArrayD<f64>,
    /// Per-output baseline, one entry per model output
    pub expected: Vec<f64>,
}

/// Attribution over a whole dataset
#[derive(Debug, Clone)]
pub struct DatasetShapleyEstimate {
    /// (K x N x D) for multi-output models, (N x D) for single-output models
    pub values: ArrayD<f64>,
    /// Per-output baseline, one entry per model output
    pub expected: Vec<f64>,
}

struct Outputs {
    flat: Array2<f64>,
    multi: bool,
}

impl Outputs {
    fn at(&self, row: usize, output: usize) -> f64 {
        self.flat[[row, output]]
    }

    fn outputs(&self) -> usize {
        self.flat.ncols()
    }
}

fn predict_rows(oracle: &dyn PredictionOracle, rows: &Array2<f64>) -> BackendResult<Outputs> {
    let out = oracle.predict(&rows.clone().into_dyn())?;
    let n = rows.nrows();
    match out.ndim() {
        1 => {
            if out.len() != n {
                return Err(BackendError::Eval(format!(
                    "oracle returned {} outputs for {} rows",
                    out.len(),
                    n
                )));
            }
            let flat = out
                .into_dimensionality::<ndarray::Ix1>()
                .map_err(|e| BackendError::Eval(e.to_string()))?
                .insert_axis(Axis(1));
            Ok(Outputs { flat, multi: false })
        }
        2 => {
            if out.shape()[0] != n {
                return Err(BackendError::Eval(format!(
                    "oracle returned {} output rows for {} input rows",
                    out.shape()[0],
                    n
                )));
            }
            let flat = out
                .into_dimensionality::<ndarray::Ix2>()
                .map_err(|e| BackendError::Eval(e.to_string()))?;
            Ok(Outputs { flat, multi: true })
        }
        rank => Err(BackendError::Eval(format!(
            "oracle output has unsupported rank {}",
            rank
        ))),
    }
}

/// Explain a single instance against a reference dataset
pub fn explain_instance(
    oracle: &dyn PredictionOracle,
    reference: &Array2<f64>,
    instance: &Array1<f64>,
    config: &ShapleyConfig,
) -> BackendResult<ShapleyEstimate> {
    let d = instance.len();
    if reference.ncols() != d {
        return Err(BackendError::Eval(format!(
            "instance has {} features but the reference data has {} columns",
            d,
            reference.ncols()
        )));
    }
    if reference.nrows() == 0 {
        return Err(BackendError::Eval(
            "reference dataset has no rows".to_string(),
        ));
    }

    let reference_out = predict_rows(oracle, reference)?;
    let k = reference_out.outputs();
    let expected: Vec<f64> = (0..k)
        .map(|class| {
            (0..reference.nrows())
                .map(|row| reference_out.at(row, class))
                .sum::<f64>()
                / reference.nrows() as f64
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut phi = Array2::<f64>::zeros((k, d));
    let mut perm: Vec<usize> = (0..d).collect();
    let n_ref = reference.nrows();

    for _ in 0..config.permutations {
        perm.shuffle(&mut rng);

        // For every reference row, rows 0..=d: the reference row with
        // features flipped to the instance values one permutation step at
        // a time. One oracle call per permutation covers the whole set.
        let mut rows = Array2::zeros((n_ref * (d + 1), d));
        for base in 0..n_ref {
            let mut current = reference.row(base).to_owned();
            rows.row_mut(base * (d + 1)).assign(&current);
            for (step, &feature) in perm.iter().enumerate() {
                current[feature] = instance[feature];
                rows.row_mut(base * (d + 1) + step + 1).assign(&current);
            }
        }

        let outs = predict_rows(oracle, &rows)?;
        for base in 0..n_ref {
            let offset = base * (d + 1);
            for (step, &feature) in perm.iter().enumerate() {
                for class in 0..k {
                    phi[[class, feature]] +=
                        outs.at(offset + step + 1, class) - outs.at(offset + step, class);
                }
            }
        }
    }
    phi.mapv_inplace(|v| v / (config.permutations * n_ref) as f64);

    let values = if reference_out.multi {
        phi.into_dyn()
    } else {
        phi.index_axis(Axis(0), 0).to_owned().into_dyn()
    };
    Ok(ShapleyEstimate { values, expected })
}

/// Explain every row of a dataset at once, producing one attribution matrix
pub fn explain_dataset(
    oracle: &dyn PredictionOracle,
    reference: &Array2<f64>,
    data: &Array2<f64>,
    config: &ShapleyConfig,
) -> BackendResult<DatasetShapleyEstimate> {
    let n = data.nrows();
    let d = data.ncols();
    if n == 0 {
        return Err(BackendError::Eval("dataset has no rows".to_string()));
    }

    let mut expected = Vec::new();
    let mut per_instance: Vec<ShapleyEstimate> = Vec::with_capacity(n);
    for (i, row) in data.axis_iter(Axis(0)).enumerate() {
        let row_config = ShapleyConfig {
            permutations: config.permutations,
            seed: config.seed.wrapping_add(i as u64),
        };
        let estimate = explain_instance(oracle, reference, &row.to_owned(), &row_config)?;
        if i == 0 {
            expected = estimate.expected.clone();
        }
        per_instance.push(estimate);
    }

    let multi = per_instance[0].values.ndim() > 1;
    let values = if multi {
        let k = per_instance[0].values.shape()[0];
        let mut stacked = ArrayD::zeros(IxDyn(&[k, n, d]));
        for (i, estimate) in per_instance.iter().enumerate() {
            for class in 0..k {
                for feature in 0..d {
                    stacked[[class, i, feature]] = estimate.values[[class, feature]];
                }
            }
        }
        stacked
    } else {
        let mut stacked = ArrayD::zeros(IxDyn(&[n, d]));
        for (i, estimate) in per_instance.iter().enumerate() {
            for feature in 0..d {
                stacked[[i, feature]] = estimate.values[[feature]];
            }
        }
        stacked
    };

    Ok(DatasetShapleyEstimate { values, expected })
}
