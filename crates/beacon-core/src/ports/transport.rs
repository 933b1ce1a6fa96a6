//! Transport port (driven/secondary port)
//!
//! Delivers a single structured payload (a batch, a crash report or a
//! crash resend) to the telemetry endpoint.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport failures are adapter-specific
//!   (HTTP status, connection refused, timeouts). Callers only need to know
//!   whether the payload was accepted.
//! - A single call is a single attempt. Retry policy lives in the agent.

use serde_json::Value;

/// Sends telemetry payloads to a backend
#[async_trait::async_trait]
pub trait ITransport: Send + Sync {
    /// Sends one payload; `Ok` means the endpoint accepted it
    async fn send(&self, payload: &Value) -> anyhow::Result<()>;
}
