//! # CLI Module
//!
//! Command-line interface:
//! - `serve`: boot the HTTP explanation server
//! - `init`: create the model repository and artifact directories

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command, ServeArgs};
pub use commands::run;
pub use errors::{CliError, CliResult};
