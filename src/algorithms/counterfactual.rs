//! # Counterfactual Search
//!
//! Gradient-free search for an instance close to the original but predicted
//! into a different (target) class. Proposals mix local perturbations around
//! the best candidate with global interpolations toward random points of the
//! value range; a proposal is kept when it improves the target-probability
//! objective net of a distance penalty. The search is stochastic: the only
//! guaranteed property is that a returned counterfactual satisfies the
//! target-class constraint.

use ndarray::Axis;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::{BackendError, BackendResult, PredictionOracle};
use crate::tensor::{self, Tensor};

use super::DEFAULT_SEED;

/// Desired class of the counterfactual instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    /// Any class other than the original prediction
    Other,
    /// The original class (useful with a target probability)
    Same,
    /// A specific class index
    Index(usize),
}

/// Search configuration with documented defaults
#[derive(Debug, Clone)]
pub struct CounterfactualConfig {
    /// Class constraint; defaults to any-other-class
    pub target_class: TargetClass,
    /// Minimum class probability the counterfactual must reach, if any
    pub target_proba: Option<f64>,
    /// Proposal budget
    pub max_iterations: usize,
    /// Local perturbation scale, relative to the value range
    pub step_scale: f64,
    /// Weight of the mean-absolute-distance penalty in the objective
    pub distance_weight: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for CounterfactualConfig {
    fn default() -> Self {
        Self {
            target_class: TargetClass::Other,
            target_proba: None,
            max_iterations: 600,
            step_scale: 0.15,
            distance_weight: 0.1,
            seed: DEFAULT_SEED,
        }
    }
}

/// A found counterfactual instance
#[derive(Debug, Clone)]
pub struct Counterfactual {
    /// Same shape as the search input, batch axis included
    pub instance: Tensor,
    /// Predicted class of the counterfactual
    pub class: usize,
    /// Full probability row of the counterfactual
    pub probabilities: Vec<f64>,
}

/// Search result; `result` is `None` when no candidate satisfied the
/// constraint within the budget
#[derive(Debug, Clone)]
pub struct CounterfactualOutcome {
    pub original_class: usize,
    pub original_probabilities: Vec<f64>,
    pub result: Option<Counterfactual>,
}

/// Run the search on a single batched instance (leading axis of size 1)
pub fn search(
    oracle: &dyn PredictionOracle,
    input: &Tensor,
    config: &CounterfactualConfig,
) -> BackendResult<CounterfactualOutcome> {
    let original = probe(oracle, input)?;
    let classes = original.len();
    let original_class = argmax_slice(&original);

    if let TargetClass::Index(t) = config.target_class {
        if t >= classes {
            return Err(BackendError::Configuration(format!(
                "target class {} is out of range for a {}-class model",
                t, classes
            )));
        }
    }

    let (vmin, vmax) = value_range(input);
    let span = if vmax > vmin { vmax - vmin } else { 1.0 };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best = input.clone();
    let mut best_probs = original.clone();
    let mut best_score = target_mass(config, &original, original_class);

    for iteration in 0..config.max_iterations {
        let candidate = if iteration % 2 == 0 {
            // Local move around the current best
            let step = config.step_scale * span;
            &best + &perturbation(&mut rng, input, step)
        } else {
            // Global interpolation toward a random point of the range
            let alpha: f64 = rng.gen_range(0.05..0.9);
            let mut target = input.clone();
            target.mapv_inplace(|_| rng.gen_range(vmin..=vmax));
            blend(&best, &target, alpha)
        };

        let probs = probe(oracle, &candidate)?;
        let dist = mean_abs_distance(&candidate, input) / span;
        let candidate_score =
            target_mass(config, &probs, original_class) - config.distance_weight * dist;
        if candidate_score > best_score {
            best = candidate;
            best_probs = probs;
            best_score = candidate_score;
        }
    }

    let best_class = argmax_slice(&best_probs);
    let satisfied = class_satisfied(config.target_class, best_class, original_class)
        && config
            .target_proba
            .map_or(true, |tp| best_probs[best_class] >= tp);

    Ok(CounterfactualOutcome {
        original_class,
        original_probabilities: original,
        result: if satisfied {
            Some(Counterfactual {
                instance: best,
                class: best_class,
                probabilities: best_probs,
            })
        } else {
            None
        },
    })
}

fn probe(oracle: &dyn PredictionOracle, input: &Tensor) -> BackendResult<Vec<f64>> {
    let out = oracle.predict(input)?;
    if out.ndim() != 2 || out.shape()[1] < 2 {
        return Err(BackendError::Configuration(
            "counterfactual search requires a classifier producing per-class probabilities"
                .to_string(),
        ));
    }
    Ok(out.index_axis(Axis(0), 0).iter().copied().collect())
}

fn class_satisfied(target: TargetClass, class: usize, original: usize) -> bool {
    match target {
        TargetClass::Other => class != original,
        TargetClass::Same => class == original,
        TargetClass::Index(t) => class == t,
    }
}

/// Objective: probability mass on the target, before the distance penalty
fn target_mass(config: &CounterfactualConfig, probs: &[f64], original: usize) -> f64 {
    match config.target_class {
        TargetClass::Other => probs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != original)
            .map(|(_, p)| *p)
            .fold(f64::NEG_INFINITY, f64::max),
        TargetClass::Same => probs[original],
        TargetClass::Index(t) => probs[t],
    }
}

fn argmax_slice(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.iter().enumerate() {
        if *v > best_value {
            best = i;
            best_value = *v;
        }
    }
    best
}

fn value_range(tensor: &Tensor) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in tensor.iter() {
        min = min.min(*v);
        max = max.max(*v);
    }
    if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 1.0)
    }
}

fn perturbation(rng: &mut StdRng, like: &Tensor, step: f64) -> Tensor {
    let mut noise = like.clone();
    noise.mapv_inplace(|_| {
        // Sum of uniforms approximates a centered normal well enough here
        let u: f64 = rng.gen_range(-1.0..1.0);
        let v: f64 = rng.gen_range(-1.0..1.0);
        step * 0.5 * (u + v)
    });
    noise
}

fn blend(a: &Tensor, b: &Tensor, alpha: f64) -> Tensor {
    let mut out = a.clone();
    ndarray::Zip::from(&mut out).and(b).for_each(|o, bv| {
        *o = (1.0 - alpha) * *o + alpha * *bv;
    });
    out
}

fn mean_abs_distance(a: &Tensor, b: &Tensor) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    ndarray::Zip::from(a).and(b).for_each(|av, bv| {
        total += (av - bv).abs();
        count += 1;
    });
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
