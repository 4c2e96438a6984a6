//! HTTP client for forwarding hops and heartbeats.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Forwarding error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("Connection failed: {0}")]
    Unreachable(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

/// Response relayed from a remote node.
#[derive(Debug, Clone)]
pub struct Relayed {
    pub status: StatusCode,
    pub body: Value,
}

/// JSON-over-HTTP client with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct ForwardClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl ForwardClient {
    /// Create a client whose requests fail after `timeout`.
    ///
    /// # Errors
    /// Returns error if the underlying client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self { http, timeout })
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `body` to `path` under `base` and return the remote status and
    /// JSON body unchanged.
    ///
    /// # Errors
    /// Returns error on connection failure, timeout, or a non-JSON body.
    pub async fn post_json<T: Serialize + Sync>(
        &self,
        base: &str,
        path: &str,
        body: &T,
    ) -> Result<Relayed, ClientError> {
        let url = endpoint(base, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(Relayed { status, body })
    }

    fn classify(&self, err: &reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Unreachable(err.to_string())
        }
    }
}

/// Join a base address and an endpoint path.
#[must_use]
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
