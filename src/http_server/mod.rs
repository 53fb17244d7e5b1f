//! # HTTP Server Module
//!
//! The axum server exposing the explanation endpoints:
//!
//! - `POST /images/counterfactual` - counterfactual search on an image
//! - `POST /tabular/shap-kernel` - kernel Shapley attribution for one instance
//! - `POST /tabular/shap-tree` - tree Shapley attribution over a dataset
//! - `POST /tabular/counterfactual-schema` - schema-only counterfactuals
//! - `GET` on each of the above - static method documentation
//! - `GET /artifacts/:name` - stored explanation artifacts
//! - `GET /health` - health check

pub mod config;
pub mod explain_routes;
pub mod server;

pub use config::ServerConfig;
pub use explain_routes::AppState;
pub use server::HttpServer;
