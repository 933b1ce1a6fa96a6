//! HTTP transport
//!
//! Posts every payload as a JSON body to a single ingestion endpoint.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beacon_core::ports::ITransport;
//! use beacon_transport::HttpTransport;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let transport = HttpTransport::with_endpoint("https://telemetry.example.com/v1/ingest")?
//!     .with_api_key("secret");
//! transport.send(&serde_json::json!({"type": "batch", "events": []})).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use beacon_core::config::TransportConfig;
use beacon_core::ports::ITransport;

use crate::TransportError;

/// Default request timeout when none is configured
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body kept in a rejection error
const MAX_ERROR_BODY: usize = 512;

/// Sends payloads to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// The underlying HTTP client
    client: Client,
    /// Ingestion URL
    endpoint: Url,
    /// Optional bearer token
    api_key: Option<String>,
    /// Per-request timeout
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport from the `transport` configuration section
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut transport = Self::with_endpoint(&config.endpoint)?.with_timeout(config.timeout());
        if let Some(key) = &config.api_key {
            transport = transport.with_api_key(key.clone());
        }
        Ok(transport)
    }

    /// Creates a transport posting to `endpoint` (useful for testing)
    pub fn with_endpoint(endpoint: impl AsRef<str>) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint.as_ref())
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", endpoint.as_ref(), e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            client: Client::new(),
            endpoint,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Sets the bearer token sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the ingestion URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts `payload` once
    pub async fn post(&self, payload: &Value) -> Result<(), TransportError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(
                reqwest::header::USER_AGENT,
                concat!("beacon/", env!("CARGO_PKG_VERSION")),
            )
            .timeout(self.timeout)
            .json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), kind = payload_kind(payload), "Payload delivered");
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(TransportError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn payload_kind(payload: &Value) -> &str {
    payload.get("type").and_then(Value::as_str).unwrap_or("unknown")
}

#[async_trait::async_trait]
impl ITransport for HttpTransport {
    async fn send(&self, payload: &Value) -> anyhow::Result<()> {
        self.post(payload).await.map_err(|e| {
            warn!(
                kind = payload_kind(payload),
                retryable = e.is_retryable(),
                error = %e,
                "Payload delivery failed"
            );
            e.into()
        })
    }
}
