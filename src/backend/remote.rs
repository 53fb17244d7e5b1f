//! # Remote Prediction Oracle
//!
//! Proxies prediction through an external scoring URL instead of a local
//! model. Each call is a blocking, synchronous HTTP round-trip with no
//! timeout, retry, or circuit-breaking; a hung remote server blocks the
//! request, and callers wanting resilience must wrap the call themselves.
//! A failed call surfaces as a transport error and is never retried.

use serde_json::Value;

use crate::tensor::{self, Tensor};

use super::errors::{BackendError, BackendResult};
use super::oracle::PredictionOracle;

/// Oracle that POSTs batches to a remote scoring endpoint.
///
/// Wire contract: request body `{"inputs": "<string-encoded nested array>"}`,
/// response body a JSON array with one output entry per input row, in order.
pub struct RemoteOracle {
    url: String,
    client: reqwest::blocking::Client,
}

impl RemoteOracle {
    /// Build an oracle for the given prediction URL
    pub fn new(url: impl Into<String>) -> BackendResult<Self> {
        // No timeout: resilience policy is the caller's responsibility
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// The configured prediction URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PredictionOracle for RemoteOracle {
    fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
        let inputs = serde_json::to_string(&tensor::to_json(batch))
            .map_err(|e| BackendError::Eval(e.to_string()))?;
        let body = serde_json::json!({ "inputs": inputs });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(BackendError::Transport(format!(
                "remote endpoint returned {}: {}",
                status, text
            )));
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            BackendError::Transport(format!("response body was not valid JSON: {}", e))
        })?;
        let outputs = tensor::from_json(&value).map_err(|e| {
            BackendError::Transport(format!("response body was not a numeric array: {}", e))
        })?;

        let expected = batch.shape().first().copied().unwrap_or(0);
        let got = outputs.shape().first().copied().unwrap_or(0);
        if got != expected {
            return Err(BackendError::Transport(format!(
                "remote endpoint returned {} outputs for {} inputs",
                got, expected
            )));
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        // Grab a free local port, then release it so the connection is refused
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let oracle = RemoteOracle::new(format!("http://{}/predict", addr)).unwrap();
        let batch = ndarray::arr2(&[[1.0, 2.0]]).into_dyn();
        let err = oracle.predict(&batch).unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
