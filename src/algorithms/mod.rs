//! # Explanation Algorithms
//!
//! The black-box procedures the orchestrator invokes against a prediction
//! oracle. Each takes an explicit configuration struct with documented
//! defaults and a seed, so identical calls produce identical estimates.

pub mod counterfactual;
pub mod shapley;
pub mod synthetic;

pub use counterfactual::{
    Counterfactual, CounterfactualConfig, CounterfactualOutcome, TargetClass,
};
pub use shapley::{DatasetShapleyEstimate, ShapleyConfig, ShapleyEstimate};
pub use synthetic::{
    DesiredClass, Domain, DomainFeature, GenerationMethod, SyntheticConfig, SyntheticOutcome,
};

/// Seed used by every stochastic algorithm unless the caller overrides it
pub const DEFAULT_SEED: u64 = 47;
