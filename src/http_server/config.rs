//! # Server Configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8090)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Model repository root
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Directory artifacts are written to
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Public base URL artifacts are served under; derived from host and
    /// port when unset
    #[serde(default)]
    pub public_base: Option<String>,

    /// CORS allowed origins; empty means permissive (development)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_artifact_dir() -> PathBuf {
    std::env::temp_dir().join("glassbox_artifacts")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_dir: default_model_dir(),
            artifact_dir: default_artifact_dir(),
            public_base: None,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a config with the given port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public base URL artifacts resolve under
    pub fn public_base_url(&self) -> String {
        match &self.public_base {
            Some(base) => base.clone(),
            None => {
                let host = if self.host == "0.0.0.0" {
                    "localhost"
                } else {
                    &self.host
                };
                format!("http://{}:{}/artifacts", host, self.port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr(), "0.0.0.0:8090");
        assert_eq!(config.public_base_url(), "http://localhost:8090/artifacts");
    }

    #[test]
    fn test_explicit_public_base_wins() {
        let config = ServerConfig {
            public_base: Some("https://xai.example.org/files".to_string()),
            ..Default::default()
        };
        assert_eq!(config.public_base_url(), "https://xai.example.org/files");
    }

    #[test]
    fn test_parses_from_partial_json() {
        let config: ServerConfig = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
    }
}
