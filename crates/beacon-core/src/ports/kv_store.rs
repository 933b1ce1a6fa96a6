//! Persisted key-value port (driven/secondary port)
//!
//! Used for small scalar state that must survive restarts, such as the
//! profile version counter.

/// Persisted string values
#[async_trait::async_trait]
pub trait IKeyValueStore: Send + Sync {
    /// Reads the value at `key`
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Writes the value at `key`
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
