//! # Observability
//!
//! Structured logging for the explanation service.

pub mod logger;

pub use logger::{Logger, Severity};
