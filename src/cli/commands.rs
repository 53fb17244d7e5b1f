//! # CLI Commands

use std::fs;

use clap::Parser;

use crate::http_server::{HttpServer, ServerConfig};

use super::args::{Cli, Command, ServeArgs};
use super::errors::{CliError, CliResult};

/// Parse arguments and dispatch to the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args),
        Command::Init(args) => init(args),
    }
}

fn config_from(args: ServeArgs) -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(model_dir) = args.model_dir {
        config.model_dir = model_dir;
    }
    if let Some(artifact_dir) = args.artifact_dir {
        config.artifact_dir = artifact_dir;
    }
    if let Some(public_base) = args.public_base {
        config.public_base = Some(public_base);
    }
    config
}

fn serve(args: ServeArgs) -> CliResult<()> {
    let config = config_from(args);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    runtime
        .block_on(HttpServer::with_config(config).start())
        .map_err(CliError::Io)
}

fn init(args: ServeArgs) -> CliResult<()> {
    let config = config_from(args);
    fs::create_dir_all(&config.model_dir)?;
    fs::create_dir_all(&config.artifact_dir)?;
    println!("model repository: {}", config.model_dir.display());
    println!("artifact storage: {}", config.artifact_dir.display());
    Ok(())
}
