//! Database Abstraction Layer
//!
//! The cache index is a single SQL table of text and integer columns. This
//! seam exposes just enough SQL to keep it: parameterized statements, row
//! maps, and atomic batches. The native implementation is SQLite via sqlx
//! (`core-library`).
//!
//! ```ignore
//! use bridge_traits::database::{DatabaseAdapter, DatabaseConfig};
//!
//! let mut adapter = SqliteAdapter::new(DatabaseConfig::new("cache.db")).await?;
//! adapter.initialize().await?;
//!
//! let row = adapter
//!     .query_one_optional("SELECT * FROM cache_records WHERE remote_id = ?", &[id.into()])
//!     .await?;
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for the cache index database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// sqlx connection string, `sqlite:<path>` or `sqlite::memory:`
    pub database_url: String,

    /// Upper bound on pooled connections
    pub max_connections: u32,

    /// How long a caller waits for a pooled connection
    pub acquire_timeout: Duration,

    /// How long a writer waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    /// File-backed database at `database_path`, created on first open.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Private in-memory database.
    ///
    /// Every connection to `sqlite::memory:` opens its own database, so the
    /// pool is pinned to one connection.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Self::new("")
        }
    }

    pub fn with_max_connections(mut self, count: u32) -> Self {
        self.max_connections = count.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =============================================================================
// Values
// =============================================================================

/// One result row, keyed by column name.
pub type QueryRow = HashMap<String, QueryValue>;

/// A bound parameter or a column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryValue {
    Null,
    Integer(i64),
    Text(String),
}

impl QueryValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer column read as a size or count; negatives are rejected.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Integer(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(QueryValue::Null)
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// SQL access for the cache index.
///
/// Implementations must be `Send + Sync` and serialize conflicting writes
/// internally: the cache manager, the proxy and background downloads all
/// share one adapter.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Verify the connection is usable.
    async fn initialize(&mut self) -> Result<()>;

    /// Release all connections. Later calls fail.
    async fn close(&mut self) -> Result<()>;

    /// Run a query and collect every row. Always bind values as `params`.
    async fn query(&self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, statement: &str, params: &[QueryValue]) -> Result<u64>;

    /// Run a query expected to match at most one row.
    async fn query_one_optional(
        &self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>>;

    /// Run statements in one transaction; any failure rolls all of them back.
    async fn execute_batch(&self, statements: &[(&str, &[QueryValue])]) -> Result<Vec<u64>>;
}
