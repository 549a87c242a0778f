//! SQLite adapter over a sqlx pool.
//!
//! The pool runs in WAL mode with a busy timeout, so index readers never
//! block the writer and concurrent writers queue instead of failing with
//! `SQLITE_BUSY`.

use async_trait::async_trait;
use bridge_traits::database::{DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue};
use bridge_traits::error::{BridgeError, Result};
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Column, Pool, Row, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::{debug, info, warn};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// [`DatabaseAdapter`] backed by a `sqlx::Pool<Sqlite>`.
pub struct SqliteAdapter {
    pool: Pool<Sqlite>,
}

impl SqliteAdapter {
    /// Open the pool. The database file is created if it does not exist.
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!(
            database_url = %config.database_url,
            max_connections = config.max_connections,
            "Opening SQLite cache index"
        );

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| BridgeError::DatabaseError(format!("Invalid database URL: {}", e)))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to open SQLite pool");
                BridgeError::DatabaseError(format!("Connection pool creation failed: {}", e))
            })?;

        Ok(Self { pool })
    }

    fn bind<'q>(mut query: SqliteQuery<'q>, params: &'q [QueryValue]) -> SqliteQuery<'q> {
        for param in params {
            query = match param {
                QueryValue::Null => query.bind(None::<i64>),
                QueryValue::Integer(i) => query.bind(*i),
                QueryValue::Text(s) => query.bind(s.as_str()),
            };
        }
        query
    }

    fn to_query_row(row: &SqliteRow) -> Result<QueryRow> {
        let mut values = QueryRow::with_capacity(row.columns().len());

        for column in row.columns() {
            let index = column.ordinal();
            let raw = row
                .try_get_raw(index)
                .map_err(|e| BridgeError::DatabaseError(e.to_string()))?;

            // Declared type is not reliable for expressions such as SUM(...).
            let value = if raw.is_null() {
                QueryValue::Null
            } else {
                match raw.type_info().name() {
                    "INTEGER" | "INT8" | "BIGINT" | "BOOLEAN" => {
                        QueryValue::Integer(row.try_get::<i64, _>(index).map_err(|e| {
                            BridgeError::DatabaseError(format!("{}: {}", column.name(), e))
                        })?)
                    }
                    _ => match row.try_get::<String, _>(index) {
                        Ok(text) => QueryValue::Text(text),
                        Err(_) => row
                            .try_get::<i64, _>(index)
                            .map(QueryValue::Integer)
                            .map_err(|e| {
                                BridgeError::DatabaseError(format!(
                                    "Unsupported value in column {}: {}",
                                    column.name(),
                                    e
                                ))
                            })?,
                    },
                }
            };

            values.insert(column.name().to_string(), value);
        }

        Ok(values)
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    async fn initialize(&mut self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Database health check failed");
                BridgeError::DatabaseError(format!("Health check failed: {}", e))
            })?;

        debug!("Cache index database ready");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        info!("Closing cache index database");
        self.pool.close().await;
        Ok(())
    }

    async fn query(&self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>> {
        debug!(query = %query, param_count = params.len(), "query");

        let rows = Self::bind(sqlx::query(query), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.iter().map(Self::to_query_row).collect()
    }

    async fn execute(&self, statement: &str, params: &[QueryValue]) -> Result<u64> {
        debug!(statement = %statement, param_count = params.len(), "execute");

        let result = Self::bind(sqlx::query(statement), params)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Execute failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn query_one_optional(
        &self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>> {
        let row = Self::bind(sqlx::query(query), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Query failed: {}", e)))?;

        row.as_ref().map(Self::to_query_row).transpose()
    }

    async fn execute_batch(&self, statements: &[(&str, &[QueryValue])]) -> Result<Vec<u64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Begin transaction failed: {}", e)))?;

        let mut affected = Vec::with_capacity(statements.len());
        for (statement, params) in statements {
            let result = Self::bind(sqlx::query(statement), params)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    BridgeError::DatabaseError(format!("Batch statement failed: {}", e))
                })?;
            affected.push(result.rows_affected());
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Commit failed: {}", e)))?;

        debug!(?affected, "Batch committed");
        Ok(affected)
    }
}
