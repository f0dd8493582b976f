//! SQLite-backed implementation of the key-value store.
//!
//! Single-node stand-in for the replicated store used in production
//! deployments. Expiry is enforced on read; a background sweep removes dead
//! rows (see `cleanup`).

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePool;

use crate::kv::{KeyValueStore, KvError};

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Clone)]
pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete all expired entries. Returns the number removed.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at <= ?")
            .bind(now_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl KeyValueStore for SqliteKv {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        let expires_at = (Utc::now() + Duration::seconds(ttl_secs as i64))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        sqlx::query(
            "INSERT INTO kv_entries (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(&expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| KvError(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv_entries WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_rfc3339())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| KvError(e.to_string()))?;
        Ok(row.map(|r| r.0))
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| KvError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_put_get_delete() {
        let db = Database::open(":memory:").await.unwrap();
        let kv = db.kv();

        kv.put("session:abc", "{\"v\":1}", 60).await.unwrap();
        assert_eq!(
            kv.get("session:abc").await.unwrap(),
            Some("{\"v\":1}".to_string())
        );

        kv.delete("session:abc").await.unwrap();
        assert_eq!(kv.get("session:abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = Database::open(":memory:").await.unwrap();
        let kv = db.kv();

        kv.put("k", "old", 60).await.unwrap();
        kv.put("k", "new", 60).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_expired_entry_is_invisible_and_swept() {
        let db = Database::open(":memory:").await.unwrap();
        let kv = db.kv();

        // Insert an already-expired row directly.
        sqlx::query("INSERT INTO kv_entries (key, value, expires_at) VALUES (?, ?, ?)")
            .bind("stale")
            .bind("{}")
            .bind("2000-01-01T00:00:00Z")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(kv.get("stale").await.unwrap(), None);
        assert_eq!(kv.delete_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_ok() {
        let db = Database::open(":memory:").await.unwrap();
        let kv = db.kv();
        kv.delete("missing").await.unwrap();
    }
}
