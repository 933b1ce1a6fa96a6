//! Agent error types
//!
//! [`AgentError::NotInitialized`] is the only error a tracking call returns
//! for an operational reason. Every delivery and storage failure behind the
//! public API is logged and absorbed.

use beacon_core::domain::{DomainError, StorageId};
use thiserror::Error;

/// Errors surfaced by the public agent API
#[derive(Debug, Error)]
pub enum AgentError {
    /// A tracking call was made before `initialize` completed, or after `dispose`
    #[error("Telemetry agent is not initialized")]
    NotInitialized,

    /// The agent was constructed outside a tokio runtime
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Attributes had a shape that cannot be flattened
    #[error(transparent)]
    InvalidAttributes(#[from] DomainError),

    /// An adapter could not be constructed
    #[error("Agent setup failed: {0}")]
    Setup(String),

    /// The offline store failed during an explicit store operation
    #[error(transparent)]
    OfflineStore(#[from] OfflineStoreError),
}

/// Errors from the offline crash store
#[derive(Debug, Error)]
pub enum OfflineStoreError {
    /// The durable store could not be read or written
    #[error("Storage failure: {0}")]
    Storage(String),

    /// A stored crash could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No stored crash with this id
    #[error("Stored crash not found: {0}")]
    NotFound(StorageId),

    /// The stored crash could not be decoded and was removed
    #[error("Stored crash {id} was corrupt and has been removed: {reason}")]
    Corrupt {
        /// Storage id of the removed entry
        id: StorageId,
        /// Decoder message
        reason: String,
    },
}

impl OfflineStoreError {
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        OfflineStoreError::Storage(format!("{err:#}"))
    }
}
