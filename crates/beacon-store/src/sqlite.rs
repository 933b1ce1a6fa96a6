//! SQLite implementation of IKeyedDurableStore
//!
//! All records live in a single `durable_records` table. Modification times
//! are stored as integer microseconds and are kept strictly increasing per
//! store instance, so that two writes in the same microsecond still order.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use beacon_core::ports::{IKeyedDurableStore, RecordInfo};

use crate::validate_key;

/// SQLite-backed keyed durable store
pub struct SqliteDurableStore {
    pool: SqlitePool,
    last_modified_micros: AtomicI64,
}

impl SqliteDurableStore {
    /// Creates a store over an already migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            last_modified_micros: AtomicI64::new(0),
        }
    }

    fn next_modified_micros(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last_modified_micros.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_modified_micros.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_default()
}

#[async_trait::async_trait]
impl IKeyedDurableStore for SqliteDurableStore {
    async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        validate_key(key)?;
        let modified_at = self.next_modified_micros();

        sqlx::query(
            "INSERT INTO durable_records (key, value, modified_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, modified_at = excluded.modified_at",
        )
        .bind(key)
        .bind(value)
        .bind(modified_at)
        .execute(&self.pool)
        .await?;

        tracing::trace!(key, size = value.len(), "Stored durable record");
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM durable_records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<Vec<u8>, _>("value")))
    }

    async fn list(&self) -> anyhow::Result<Vec<RecordInfo>> {
        let rows = sqlx::query(
            "SELECT key, modified_at, LENGTH(value) AS size_bytes FROM durable_records",
        )
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .iter()
            .map(|row| RecordInfo {
                key: row.get("key"),
                modified_at: micros_to_datetime(row.get("modified_at")),
                size_bytes: row.get::<i64, _>("size_bytes").max(0) as u64,
            })
            .collect();
        Ok(records)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM durable_records WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabasePool;

    async fn setup() -> SqliteDurableStore {
        let pool = DatabasePool::in_memory().await.unwrap();
        SqliteDurableStore::new(pool.pool().clone())
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = setup().await;
        store.put("a", b"one").await.unwrap();
        store.put("a", b"two").await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_modified_times_strictly_increase() {
        let store = setup().await;
        for key in ["k1", "k2", "k3"] {
            store.put(key, b"x").await.unwrap();
        }
        let mut records = store.list().await.unwrap();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        assert!(records[0].modified_at < records[1].modified_at);
        assert!(records[1].modified_at < records[2].modified_at);
        assert_eq!(records[0].size_bytes, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = setup().await;
        store.put("gone", b"x").await.unwrap();
        assert!(store.delete("gone").await.unwrap());
        assert!(!store.delete("gone").await.unwrap());
        assert!(store.get("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_invalid_key() {
        let store = setup().await;
        assert!(store.put("../escape", b"x").await.is_err());
    }
}
