//! Keyed durable store port (driven/secondary port)
//!
//! A filesystem-like store of opaque records addressed by key. Capacity
//! and eviction policy live above this interface, in the offline crash
//! store; implementations only persist bytes.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (filesystem, SQLite).
//! - `list` reports each record's last modification time, which is what
//!   capacity eviction orders by.
//! - `delete` on a missing key returns `Ok(false)` rather than an error.

use chrono::{DateTime, Utc};

/// Listing entry for one stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    /// Record key
    pub key: String,
    /// Last time the record was written
    pub modified_at: DateTime<Utc>,
    /// Size of the stored value
    pub size_bytes: u64,
}

/// Durable storage of opaque records
#[async_trait::async_trait]
pub trait IKeyedDurableStore: Send + Sync {
    /// Creates or replaces the record at `key`
    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;

    /// Reads the record at `key`
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Lists every stored record, in no particular order
    async fn list(&self) -> anyhow::Result<Vec<RecordInfo>>;

    /// Removes the record at `key`; returns whether it existed
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
}
