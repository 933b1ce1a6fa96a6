//! Beacon Transport - Payload delivery adapters
//!
//! Implementations of the [`ITransport`](beacon_core::ports::ITransport) port:
//!
//! - [`http`] - JSON POST to the configured ingestion endpoint
//! - [`memory`] - Records payloads in memory; can be switched into failing mode
//!
//! A transport makes exactly one attempt per call. Whether a failure leads to
//! offline persistence (crashes) or is dropped (batches) is decided by the agent.

pub mod http;
pub mod memory;

pub use http::HttpTransport;
pub use memory::InMemoryTransport;

use thiserror::Error;

/// Errors that can occur while delivering a payload
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint URL is malformed
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The endpoint answered with a non-success status
    #[error("Endpoint rejected payload with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The request did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The transport was configured to fail
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Whether the endpoint might accept the same payload later
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Rejected { status, .. } => *status >= 500 || *status == 429,
            TransportError::InvalidEndpoint(_) => false,
            TransportError::Timeout
            | TransportError::Network(_)
            | TransportError::Unavailable(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let server = TransportError::Rejected {
            status: 503,
            body: String::new(),
        };
        let throttled = TransportError::Rejected {
            status: 429,
            body: String::new(),
        };
        let client = TransportError::Rejected {
            status: 400,
            body: "bad payload".to_string(),
        };

        assert!(server.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!client.is_retryable());
        assert!(TransportError::Timeout.is_retryable());
        assert!(!TransportError::InvalidEndpoint("x".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::Rejected {
            status: 500,
            body: "oops".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Endpoint rejected payload with status 500: oops"
        );
    }
}
