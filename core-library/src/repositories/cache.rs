//! Database repository for cache records
//!
//! Stores the index of locally cached files in SQLite through the
//! `DatabaseAdapter` bridge. Every operation is safe to call concurrently; the
//! adapter serializes conflicting writes.

use crate::error::{LibraryError, Result};
use crate::models::CacheRecord;
use bridge_traits::database::{DatabaseAdapter, QueryRow, QueryValue};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Repository trait for cache record operations.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the `cache_records` table and its index if missing.
    async fn initialize(&self) -> Result<()>;

    /// Find a record by remote id. The caller verifies the file still exists.
    async fn lookup(&self, remote_id: &str) -> Result<Option<CacheRecord>>;

    /// Insert a record or replace every field of the existing one.
    async fn upsert(&self, record: &CacheRecord) -> Result<()>;

    /// Update only `last_accessed_at` (Unix millis). Missing ids are ignored.
    async fn touch(&self, remote_id: &str, accessed_at: i64) -> Result<()>;

    /// Delete a record. Missing ids are ignored.
    async fn delete(&self, remote_id: &str) -> Result<()>;

    /// All records, least recently accessed first.
    async fn list_all_by_last_access_ascending(&self) -> Result<Vec<CacheRecord>>;

    /// Sum of `size_bytes` over all records.
    async fn total_size(&self) -> Result<u64>;

    /// Delete every record.
    async fn clear(&self) -> Result<()>;
}

/// SQLite implementation of CacheStore.
pub struct SqliteCacheStore {
    db: Arc<dyn DatabaseAdapter>,
}

impl SqliteCacheStore {
    /// Create a new repository with the given database adapter.
    pub fn new(db: Arc<dyn DatabaseAdapter>) -> Self {
        Self { db }
    }

    fn row_to_record(row: &QueryRow) -> Result<CacheRecord> {
        Ok(CacheRecord {
            remote_id: get_string(row, "remote_id")?,
            local_path: PathBuf::from(get_string(row, "local_path")?),
            size_bytes: get_u64(row, "size_bytes")?,
            cached_at: get_i64(row, "cached_at")?,
            last_accessed_at: get_i64(row, "last_accessed_at")?,
        })
    }
}

#[async_trait::async_trait]
impl CacheStore for SqliteCacheStore {
    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<()> {
        debug!("Initializing cache record repository");

        let statements = [
            (
                "CREATE TABLE IF NOT EXISTS cache_records (
                    remote_id TEXT PRIMARY KEY NOT NULL,
                    local_path TEXT NOT NULL,
                    size_bytes INTEGER NOT NULL,
                    cached_at INTEGER NOT NULL,
                    last_accessed_at INTEGER NOT NULL
                )",
                &[] as &[QueryValue],
            ),
            (
                "CREATE INDEX IF NOT EXISTS idx_cache_records_last_accessed ON cache_records(last_accessed_at)",
                &[],
            ),
        ];

        self.db.execute_batch(&statements).await.map_err(|e| {
            error!("Failed to create cache_records table: {}", e);
            LibraryError::CacheError(format!("Failed to initialize repository: {}", e))
        })?;

        debug!("Cache record repository initialized");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn lookup(&self, remote_id: &str) -> Result<Option<CacheRecord>> {
        let sql = "SELECT * FROM cache_records WHERE remote_id = ?";
        let params = [QueryValue::from(remote_id)];

        let row = self.db.query_one_optional(sql, &params).await.map_err(|e| {
            error!("Failed to query cache record: {}", e);
            LibraryError::CacheError(format!("Failed to query cache record: {}", e))
        })?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    #[instrument(skip(self, record), fields(remote_id = %record.remote_id))]
    async fn upsert(&self, record: &CacheRecord) -> Result<()> {
        record.validate().map_err(|message| LibraryError::InvalidInput {
            field: "cache_record".to_string(),
            message,
        })?;

        let sql = r#"
            INSERT INTO cache_records (remote_id, local_path, size_bytes, cached_at, last_accessed_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(remote_id) DO UPDATE SET
                local_path = excluded.local_path,
                size_bytes = excluded.size_bytes,
                cached_at = excluded.cached_at,
                last_accessed_at = excluded.last_accessed_at
        "#;

        let size_bytes = i64::try_from(record.size_bytes).map_err(|_| LibraryError::InvalidInput {
            field: "size_bytes".to_string(),
            message: format!("{} does not fit the index", record.size_bytes),
        })?;
        let params = [
            QueryValue::from(record.remote_id.as_str()),
            QueryValue::from(record.local_path.to_string_lossy().into_owned()),
            QueryValue::from(size_bytes),
            QueryValue::from(record.cached_at),
            QueryValue::from(record.last_accessed_at),
        ];

        self.db.execute(sql, &params).await.map_err(|e| {
            error!("Failed to upsert cache record: {}", e);
            LibraryError::CacheError(format!("Failed to upsert cache record: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch(&self, remote_id: &str, accessed_at: i64) -> Result<()> {
        let sql = "UPDATE cache_records SET last_accessed_at = ? WHERE remote_id = ?";
        let params = [QueryValue::from(accessed_at), QueryValue::from(remote_id)];

        self.db.execute(sql, &params).await.map_err(|e| {
            error!("Failed to touch cache record: {}", e);
            LibraryError::CacheError(format!("Failed to touch cache record: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, remote_id: &str) -> Result<()> {
        let sql = "DELETE FROM cache_records WHERE remote_id = ?";
        let params = [QueryValue::from(remote_id)];

        self.db.execute(sql, &params).await.map_err(|e| {
            error!("Failed to delete cache record: {}", e);
            LibraryError::CacheError(format!("Failed to delete cache record: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_all_by_last_access_ascending(&self) -> Result<Vec<CacheRecord>> {
        let sql = "SELECT * FROM cache_records ORDER BY last_accessed_at ASC, remote_id ASC";

        let rows = self.db.query(sql, &[]).await.map_err(|e| {
            error!("Failed to list cache records: {}", e);
            LibraryError::CacheError(format!("Failed to list cache records: {}", e))
        })?;

        rows.iter().map(Self::row_to_record).collect()
    }

    #[instrument(skip(self))]
    async fn total_size(&self) -> Result<u64> {
        let sql = "SELECT COALESCE(SUM(size_bytes), 0) AS total FROM cache_records";

        let row = self.db.query_one_optional(sql, &[]).await.map_err(|e| {
            error!("Failed to sum cache size: {}", e);
            LibraryError::CacheError(format!("Failed to sum cache size: {}", e))
        })?;

        match row {
            Some(row) => get_u64(&row, "total"),
            None => Ok(0),
        }
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.db
            .execute("DELETE FROM cache_records", &[])
            .await
            .map_err(|e| {
                error!("Failed to clear cache records: {}", e);
                LibraryError::CacheError(format!("Failed to clear cache records: {}", e))
            })?;

        Ok(())
    }
}

// ============================================================================
// Helper functions for extracting values from QueryRow
// ============================================================================

fn column<'a, T>(
    row: &'a QueryRow,
    key: &str,
    read: impl FnOnce(&'a QueryValue) -> Option<T>,
) -> Result<T> {
    row.get(key)
        .and_then(read)
        .ok_or_else(|| LibraryError::CorruptRecord(format!("missing or mistyped column {}", key)))
}

fn get_string(row: &QueryRow, key: &str) -> Result<String> {
    column(row, key, |value| value.as_str().map(str::to_string))
}

fn get_i64(row: &QueryRow, key: &str) -> Result<i64> {
    column(row, key, QueryValue::as_i64)
}

fn get_u64(row: &QueryRow, key: &str) -> Result<u64> {
    column(row, key, QueryValue::as_u64)
}
