//! glassbox - a self-hostable explanation service for machine-learning models
//!
//! Exposes HTTP endpoints that produce human-interpretable explanations
//! (counterfactual instances, Shapley attributions) for predictions made by
//! externally supplied models, plus a rendered visualization artifact per call.

pub mod algorithms;
pub mod artifact;
pub mod backend;
pub mod cli;
pub mod explain;
pub mod http_server;
pub mod observability;
pub mod render;
pub mod repository;
pub mod tensor;
