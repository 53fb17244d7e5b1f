//! # CLI Arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Self-hostable explanation service for machine-learning models
#[derive(Debug, Parser)]
#[command(name = "glassbox", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP explanation server
    Serve(ServeArgs),
    /// Create the model repository and artifact directories
    Init(ServeArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(long)]
    pub port: Option<u16>,

    /// Model repository root
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Directory artifacts are written to
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Public base URL artifacts are served under
    #[arg(long)]
    pub public_base: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_args_parse() {
        let cli = Cli::parse_from([
            "glassbox",
            "serve",
            "--port",
            "9000",
            "--model-dir",
            "/srv/models",
        ]);
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port, Some(9000));
                assert_eq!(args.model_dir, Some(PathBuf::from("/srv/models")));
                assert!(args.host.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
