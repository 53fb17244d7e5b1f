//! # Schema-Only Counterfactual Generation
//!
//! Privacy-preserving counterfactual generation without any real training
//! data: candidates are sampled from a declared feature domain (ranges and
//! admissible values only) and kept when the oracle predicts them into the
//! desired class. Random sampling draws independent candidates; the genetic
//! method evolves a population toward the desired class while staying close
//! to the query instance. Stochastic by contract: the guaranteed property is
//! that every returned row is predicted into the desired class.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::{BackendError, BackendResult, PredictionOracle};
use crate::tensor;

use super::DEFAULT_SEED;

/// How candidate rows are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMethod {
    #[default]
    Random,
    Genetic,
}

impl GenerationMethod {
    /// Parse a method name; only random and genetic are supported
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "random" => Some(GenerationMethod::Random),
            "genetic" => Some(GenerationMethod::Genetic),
            _ => None,
        }
    }
}

/// Class the counterfactuals should be predicted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredClass {
    Index(usize),
    /// The other class of a binary model
    Opposite,
}

/// Value domain of one feature, numerically coded
#[derive(Debug, Clone)]
pub enum DomainFeature {
    Continuous {
        min: f64,
        max: f64,
        precision: Option<u32>,
    },
    Categorical {
        values: Vec<f64>,
    },
}

impl DomainFeature {
    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            DomainFeature::Continuous {
                min,
                max,
                precision,
            } => {
                let v = if max > min {
                    rng.gen_range(*min..=*max)
                } else {
                    *min
                };
                round_to(v, *precision)
            }
            DomainFeature::Categorical { values } => {
                if values.is_empty() {
                    0.0
                } else {
                    values[rng.gen_range(0..values.len())]
                }
            }
        }
    }

    fn span(&self) -> f64 {
        match self {
            DomainFeature::Continuous { min, max, .. } if max > min => max - min,
            DomainFeature::Continuous { .. } => 1.0,
            DomainFeature::Categorical { values } => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if max > min {
                    max - min
                } else {
                    1.0
                }
            }
        }
    }
}

fn round_to(v: f64, precision: Option<u32>) -> f64 {
    match precision {
        Some(p) => {
            let factor = 10f64.powi(p as i32);
            (v * factor).round() / factor
        }
        None => v,
    }
}

/// Declared data domain, one entry per feature in schema order
#[derive(Debug, Clone)]
pub struct Domain {
    pub features: Vec<DomainFeature>,
}

/// Generation configuration with documented defaults
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Counterfactuals requested per instance
    pub total: usize,
    /// Desired counterfactual class
    pub desired_class: DesiredClass,
    /// Indices of the features allowed to vary; `None` means all
    pub features_to_vary: Option<Vec<usize>>,
    pub method: GenerationMethod,
    /// Candidate budget for random sampling
    pub max_draws: usize,
    /// Generations evolved by the genetic method
    pub generations: usize,
    /// Population size of the genetic method
    pub population: usize,
    /// RNG seed
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            total: 3,
            desired_class: DesiredClass::Index(1),
            features_to_vary: None,
            method: GenerationMethod::Random,
            max_draws: 4096,
            generations: 40,
            population: 64,
            seed: DEFAULT_SEED,
        }
    }
}

/// Generation result; an empty list means no valid counterfactual was found
/// and must be reported as such, never dropped silently
#[derive(Debug, Clone)]
pub struct SyntheticOutcome {
    pub counterfactuals: Vec<Vec<f64>>,
    /// Resolved desired class index
    pub desired: usize,
}

/// Generate counterfactual rows for one instance
pub fn generate(
    oracle: &dyn PredictionOracle,
    instance: &Array1<f64>,
    domain: &Domain,
    config: &SyntheticConfig,
) -> BackendResult<SyntheticOutcome> {
    let d = domain.features.len();
    if instance.len() != d {
        return Err(BackendError::Eval(format!(
            "instance has {} features but the schema declares {}",
            instance.len(),
            d
        )));
    }

    let probe = oracle.predict(&instance.clone().insert_axis(Axis(0)).into_dyn())?;
    if probe.ndim() != 2 || probe.shape()[1] < 2 {
        return Err(BackendError::Configuration(
            "counterfactual generation requires a classifier producing per-class probabilities"
                .to_string(),
        ));
    }
    let classes = probe.shape()[1];
    let first_row = probe
        .index_axis(Axis(0), 0)
        .into_dimensionality::<ndarray::Ix1>()
        .map_err(|e| BackendError::Eval(e.to_string()))?;
    let original_class = tensor::argmax(&first_row);

    let desired = match config.desired_class {
        DesiredClass::Index(i) => {
            if i >= classes {
                return Err(BackendError::Configuration(format!(
                    "desired class {} is out of range for a {}-class model",
                    i, classes
                )));
            }
            i
        }
        DesiredClass::Opposite => {
            if classes != 2 {
                return Err(BackendError::Configuration(
                    "'opposite' is only defined for binary classification".to_string(),
                ));
            }
            1 - original_class
        }
    };

    let vary: Vec<usize> = match &config.features_to_vary {
        Some(indices) => {
            for &i in indices {
                if i >= d {
                    return Err(BackendError::Configuration(format!(
                        "feature index {} is out of range for {} schema features",
                        i, d
                    )));
                }
            }
            indices.clone()
        }
        None => (0..d).collect(),
    };
    if vary.is_empty() {
        return Err(BackendError::Configuration(
            "at least one feature must be allowed to vary".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let rows = match config.method {
        GenerationMethod::Random => {
            random_search(oracle, instance, domain, config, desired, &vary, &mut rng)?
        }
        GenerationMethod::Genetic => {
            genetic_search(oracle, instance, domain, config, desired, &vary, &mut rng)?
        }
    };

    Ok(SyntheticOutcome {
        counterfactuals: rows,
        desired,
    })
}

fn sample_candidate(
    rng: &mut StdRng,
    instance: &Array1<f64>,
    domain: &Domain,
    vary: &[usize],
) -> Vec<f64> {
    let mut row = instance.to_vec();
    for &j in vary {
        row[j] = domain.features[j].sample(rng);
    }
    row
}

fn predicted_classes(
    oracle: &dyn PredictionOracle,
    rows: &[Vec<f64>],
) -> BackendResult<Vec<usize>> {
    let d = rows.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    let batch = Array2::from_shape_vec((rows.len(), d), flat)
        .map_err(|e| BackendError::Eval(e.to_string()))?;
    let out = oracle.predict(&batch.into_dyn())?;
    if out.ndim() != 2 {
        return Err(BackendError::Eval(
            "classifier output lost its class axis mid-search".to_string(),
        ));
    }
    let mut classes = Vec::with_capacity(rows.len());
    for row in out.axis_iter(Axis(0)) {
        let row = row
            .into_dimensionality::<ndarray::Ix1>()
            .map_err(|e| BackendError::Eval(e.to_string()))?;
        classes.push(tensor::argmax(&row));
    }
    Ok(classes)
}

fn random_search(
    oracle: &dyn PredictionOracle,
    instance: &Array1<f64>,
    domain: &Domain,
    config: &SyntheticConfig,
    desired: usize,
    vary: &[usize],
    rng: &mut StdRng,
) -> BackendResult<Vec<Vec<f64>>> {
    const BATCH: usize = 64;
    let mut found: Vec<Vec<f64>> = Vec::new();
    let mut drawn = 0usize;

    while found.len() < config.total && drawn < config.max_draws {
        let count = BATCH.min(config.max_draws - drawn);
        let candidates: Vec<Vec<f64>> = (0..count)
            .map(|_| sample_candidate(rng, instance, domain, vary))
            .collect();
        drawn += count;

        let classes = predicted_classes(oracle, &candidates)?;
        for (row, class) in candidates.into_iter().zip(classes) {
            if class == desired && !found.contains(&row) {
                found.push(row);
                if found.len() == config.total {
                    break;
                }
            }
        }
    }
    Ok(found)
}

fn genetic_search(
    oracle: &dyn PredictionOracle,
    instance: &Array1<f64>,
    domain: &Domain,
    config: &SyntheticConfig,
    desired: usize,
    vary: &[usize],
    rng: &mut StdRng,
) -> BackendResult<Vec<Vec<f64>>> {
    let mut population: Vec<Vec<f64>> = (0..config.population)
        .map(|_| sample_candidate(rng, instance, domain, vary))
        .collect();

    for _ in 0..config.generations {
        let fitness = population_fitness(oracle, instance, domain, desired, &population)?;
        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|a, b| {
            fitness[*b]
                .partial_cmp(&fitness[*a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let elite_count = (population.len() / 4).max(2);
        let elites: Vec<Vec<f64>> = order[..elite_count]
            .iter()
            .map(|&i| population[i].clone())
            .collect();

        let mut next = elites.clone();
        while next.len() < config.population {
            let a = &elites[rng.gen_range(0..elites.len())];
            let b = &elites[rng.gen_range(0..elites.len())];
            let mut child: Vec<f64> = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| if rng.gen_bool(0.5) { *x } else { *y })
                .collect();
            for &j in vary {
                if rng.gen_bool(0.2) {
                    child[j] = domain.features[j].sample(rng);
                }
            }
            next.push(child);
        }
        population = next;
    }

    // Harvest: distinct feasible rows, fittest first
    let fitness = population_fitness(oracle, instance, domain, desired, &population)?;
    let classes = predicted_classes(oracle, &population)?;
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|a, b| {
        fitness[*b]
            .partial_cmp(&fitness[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut found: Vec<Vec<f64>> = Vec::new();
    for i in order {
        if classes[i] == desired && !found.contains(&population[i]) {
            found.push(population[i].clone());
            if found.len() == config.total {
                break;
            }
        }
    }
    Ok(found)
}

fn population_fitness(
    oracle: &dyn PredictionOracle,
    instance: &Array1<f64>,
    domain: &Domain,
    desired: usize,
    population: &[Vec<f64>],
) -> BackendResult<Vec<f64>> {
    let d = instance.len();
    let flat: Vec<f64> = population.iter().flatten().copied().collect();
    let batch = Array2::from_shape_vec((population.len(), d), flat)
        .map_err(|e| BackendError::Eval(e.to_string()))?;
    let out = oracle.predict(&batch.into_dyn())?;
    if out.ndim() != 2 || desired >= out.shape()[1] {
        return Err(BackendError::Eval(
            "classifier output lost its class axis mid-search".to_string(),
        ));
    }

    Ok(population
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let p = out[[i, desired]];
            let proximity: f64 = row
                .iter()
                .zip(instance.iter())
                .enumerate()
                .map(|(j, (a, b))| (a - b).abs() / domain.features[j].span())
                .sum::<f64>()
                / d as f64;
            p - 0.25 * proximity
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResult;
    use crate::tensor::Tensor;

    /// Class 1 iff x0 + x1 > 10
    struct SumOracle;

    impl PredictionOracle for SumOracle {
        fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
            let rows = crate::tensor::flatten_rows(batch).unwrap();
            let n = rows.nrows();
            let mut out = Array2::zeros((n, 2));
            for (i, row) in rows.axis_iter(Axis(0)).enumerate() {
                let p1 = 1.0 / (1.0 + (-(row[0] + row[1] - 10.0)).exp());
                out[[i, 0]] = 1.0 - p1;
                out[[i, 1]] = p1;
            }
            Ok(out.into_dyn())
        }
    }

    fn domain() -> Domain {
        Domain {
            features: vec![
                DomainFeature::Continuous {
                    min: 0.0,
                    max: 10.0,
                    precision: Some(1),
                },
                DomainFeature::Continuous {
                    min: 0.0,
                    max: 10.0,
                    precision: None,
                },
            ],
        }
    }

    #[test]
    fn test_random_counterfactuals_reach_desired_class() {
        let instance = ndarray::arr1(&[1.0, 1.0]);
        let outcome = generate(
            &SumOracle,
            &instance,
            &domain(),
            &SyntheticConfig::default(),
        )
        .unwrap();
        assert!(!outcome.counterfactuals.is_empty());
        for row in &outcome.counterfactuals {
            assert!(row[0] + row[1] > 10.0, "row {:?} is not class 1", row);
        }
    }

    #[test]
    fn test_genetic_counterfactuals_reach_desired_class() {
        let instance = ndarray::arr1(&[1.0, 1.0]);
        let config = SyntheticConfig {
            method: GenerationMethod::Genetic,
            ..SyntheticConfig::default()
        };
        let outcome = generate(&SumOracle, &instance, &domain(), &config).unwrap();
        for row in &outcome.counterfactuals {
            assert!(row[0] + row[1] > 10.0);
        }
    }

    #[test]
    fn test_fixed_features_do_not_vary() {
        let instance = ndarray::arr1(&[9.0, 1.0]);
        let config = SyntheticConfig {
            features_to_vary: Some(vec![1]),
            ..SyntheticConfig::default()
        };
        let outcome = generate(&SumOracle, &instance, &domain(), &config).unwrap();
        for row in &outcome.counterfactuals {
            assert_eq!(row[0], 9.0);
        }
    }

    #[test]
    fn test_opposite_requires_binary() {
        struct ThreeClassOracle;
        impl PredictionOracle for ThreeClassOracle {
            fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
                let n = batch.shape()[0];
                let mut out = Array2::zeros((n, 3));
                out.column_mut(0).fill(1.0);
                Ok(out.into_dyn())
            }
        }
        let config = SyntheticConfig {
            desired_class: DesiredClass::Opposite,
            ..SyntheticConfig::default()
        };
        let err = generate(
            &ThreeClassOracle,
            &ndarray::arr1(&[1.0, 1.0]),
            &domain(),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
    }

    #[test]
    fn test_impossible_target_yields_empty_flagged_outcome() {
        // Domain capped so x0 + x1 can never exceed 10
        let tight = Domain {
            features: vec![
                DomainFeature::Continuous {
                    min: 0.0,
                    max: 4.0,
                    precision: None,
                },
                DomainFeature::Continuous {
                    min: 0.0,
                    max: 4.0,
                    precision: None,
                },
            ],
        };
        let config = SyntheticConfig {
            max_draws: 256,
            ..SyntheticConfig::default()
        };
        let outcome = generate(&SumOracle, &ndarray::arr1(&[1.0, 1.0]), &tight, &config).unwrap();
        assert!(outcome.counterfactuals.is_empty());
    }
}
