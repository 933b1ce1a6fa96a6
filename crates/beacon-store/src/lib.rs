//! Beacon Store - Durable storage adapters
//!
//! Implementations of the storage ports defined in `beacon-core`:
//! - [`IKeyedDurableStore`](beacon_core::ports::IKeyedDurableStore) backed by
//!   a directory of files, by SQLite, or by memory
//! - [`IKeyValueStore`](beacon_core::ports::IKeyValueStore) backed by a
//!   directory of files or by memory
//!
//! ## Architecture
//!
//! These are driven (secondary) adapters in the hexagonal architecture.
//! They persist opaque bytes only; capacity limits and eviction are the
//! concern of the agent's offline crash store.
//!
//! ## Key Components
//!
//! - [`FileDurableStore`] - One file per record, atomic writes
//! - [`SqliteDurableStore`] - Single-table SQLite store over a [`DatabasePool`]
//! - [`MemoryDurableStore`] / [`MemoryKeyValueStore`] - In-process stores for tests
//! - [`FileKeyValueStore`] - One small text file per key
//! - [`StoreError`] - Error types for storage operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use beacon_store::{DatabasePool, SqliteDurableStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/beacon/crashes/offline.db")).await?;
//! let store = SqliteDurableStore::new(pool.pool().clone());
//! // Use store as IKeyedDurableStore...
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod kv;
pub mod memory;
pub mod pool;
pub mod sqlite;

pub use file::FileDurableStore;
pub use kv::FileKeyValueStore;
pub use memory::{MemoryDurableStore, MemoryKeyValueStore};
pub use pool::DatabasePool;
pub use sqlite::SqliteDurableStore;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Key is empty or could escape the storage directory
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    /// Filesystem I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

/// Rejects keys that are empty or could name a path outside the store
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.trim().is_empty()
        || key.starts_with('.')
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
