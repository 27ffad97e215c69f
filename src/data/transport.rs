//! HTTP transport for the series API
//!
//! `Transport` is the seam between the fetch client and the network. The
//! production implementation wraps a reqwest `Client`; tests substitute
//! scripted implementations.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when talking to the API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete within the transport timeout
    #[error("Request timed out")]
    Timeout,

    /// The connection could not be established or was aborted
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server answered with a non-success status
    #[error("Server returned HTTP {0}")]
    Status(u16),

    /// The response body was not what we expected
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Whether a retry has a reasonable chance of succeeding
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connection(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() {
            TransportError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Malformed(e.to_string())
        }
    }
}

/// Issues GET requests that return JSON
#[async_trait]
pub trait Transport: Send + Sync {
    /// GETs `path` with the given query parameters and parses the body as JSON
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError>;
}

/// reqwest-backed transport against a base URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a transport with a custom HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}
