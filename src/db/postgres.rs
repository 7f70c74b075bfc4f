//! PostgreSQL database client implementation.
//!
//! Provides `PostgresClient`, which implements `DatabaseClient` using sqlx,
//! and `PostgresLoadSession`, which wraps a transaction and isolates each
//! table creation and COPY in its own savepoint.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, DatabaseClient, LoadSession, QueryResult, Row, Value};
use crate::error::{LoaderError, Result};
use crate::schema::{quote_ident, TableSchema};
use crate::source::CopyFormat;
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Connection, Postgres, Row as SqlxRow, Transaction, TypeInfo};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Upper bound on establishing the connection; statements have no timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes read from a source file per COPY data message.
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// PostgreSQL database client.
///
/// Holds a pool capped at a single connection; all work is sequential.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Creates a new PostgresClient from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database described by `config`, retrying transient failures.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = pool_options().connect(&conn_str).await;

            match result {
                Ok(pool) => {
                    debug!("Connected to {}", config.display_string());
                    return Ok(Self { pool });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2; // Exponential backoff
                    } else {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(map_connection_error(e, config)),
            None => Err(LoaderError::internal("no connection attempt was made")),
        }
    }
}

/// One connection, opened once and kept until the client is closed.
fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(CONNECT_TIMEOUT)
        .idle_timeout(None)
        .max_lifetime(None)
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn database_exists(&self, name: &str) -> Result<bool> {
        let found: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    LoaderError::query(format!(
                        "Failed to check for database '{name}': {}",
                        format_query_error(e)
                    ))
                })?;

        Ok(found.is_some())
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        // CREATE DATABASE cannot run inside a transaction block, so it goes
        // through the simple query protocol on its own.
        let statement = format!("CREATE DATABASE {}", quote_ident(name));
        sqlx::raw_sql(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                LoaderError::query(format!(
                    "Could not create database '{name}'. Check user privileges. {}",
                    format_query_error(e)
                ))
            })?;
        Ok(())
    }

    async fn begin_load(&self) -> Result<Box<dyn LoadSession>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LoaderError::query(format!("Failed to open transaction: {e}")))?;
        Ok(Box::new(PostgresLoadSession { tx }))
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        // The simple query protocol returns every column in text form, so
        // types without a native decoder (NUMERIC, DATE, arrays) still render.
        let result = sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LoaderError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|first_row| {
                first_row
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Transaction used by the provisioner for table creation and loading.
pub struct PostgresLoadSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LoadSession for PostgresLoadSession {
    async fn create_table(&mut self, table: &TableSchema) -> Result<()> {
        let statement = table.create_table_sql();
        debug!("{statement}");

        let mut savepoint = self.tx.begin().await.map_err(|e| {
            LoaderError::query(format!("Failed to open savepoint: {e}"))
        })?;

        match sqlx::query(&statement).execute(&mut *savepoint).await {
            Ok(_) => savepoint.commit().await.map_err(|e| {
                LoaderError::query(format!("Failed to release savepoint: {e}"))
            }),
            Err(e) => {
                if let Err(rollback_err) = savepoint.rollback().await {
                    warn!("Rollback of '{}' failed: {}", table.name, rollback_err);
                }
                Err(LoaderError::query(format_query_error(e)))
            }
        }
    }

    async fn copy_in(
        &mut self,
        table: &TableSchema,
        format: &CopyFormat,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64> {
        let statement = format.copy_statement(table);
        debug!("{statement}");

        let mut savepoint = self.tx.begin().await.map_err(|e| {
            LoaderError::query(format!("Failed to open savepoint: {e}"))
        })?;

        match stream_copy(&mut savepoint, &statement, source).await {
            Ok(rows) => {
                savepoint.commit().await.map_err(|e| {
                    LoaderError::query(format!("Failed to release savepoint: {e}"))
                })?;
                Ok(rows)
            }
            Err(e) => {
                if let Err(rollback_err) = savepoint.rollback().await {
                    warn!("Rollback of '{}' failed: {}", table.name, rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| LoaderError::query(format!("Commit failed: {}", format_query_error(e))))
    }
}

/// Runs one `COPY ... FROM STDIN`, feeding it `source` in fixed-size chunks.
async fn stream_copy(
    conn: &mut PgConnection,
    statement: &str,
    source: &mut (dyn AsyncRead + Unpin + Send),
) -> Result<u64> {
    let mut copy = conn
        .copy_in_raw(statement)
        .await
        .map_err(|e| LoaderError::load(format_query_error(e)))?;

    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let message = format!("Failed to read source: {e}");
                if let Err(abort_err) = copy.abort(message.clone()).await {
                    debug!("COPY abort reported: {abort_err}");
                }
                return Err(LoaderError::load(message));
            }
        };

        copy.send(&buf[..n])
            .await
            .map_err(|e| LoaderError::load(format_query_error(e)))?;
    }

    copy.finish()
        .await
        .map_err(|e| LoaderError::load(format_query_error(e)))
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        // Go through the shortest decimal form so 8.3 stays 8.3 after widening.
        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v.to_string().parse().unwrap_or(v as f64)))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "NUMERIC" => text_value(row, index)
            .map(Value::Numeric)
            .unwrap_or(Value::Null),

        // Everything else keeps the server's text form.
        _ => text_value(row, index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Reads a column's raw text without a type compatibility check.
fn text_value(row: &PgRow, index: usize) -> Option<String> {
    row.try_get_unchecked::<Option<String>, _>(index)
        .ok()
        .flatten()
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    // Connection refused or timeout are often transient
    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
    {
        return true;
    }

    false
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> LoaderError {
    let host = &config.host;
    let port = config.port;
    let user = &config.credentials.user;
    let database = &config.database;

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        LoaderError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        LoaderError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        LoaderError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        LoaderError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        LoaderError::connection(format!("{database} @ {host}:{port}: {error}"))
    }
}

/// Formats a database error with detail and hint when the server sent them.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }

        // COPY failures report the offending input line here.
        if let Some(context) = pg_error.r#where() {
            result.push_str("\n  CONTEXT: ");
            result.push_str(context);
        }
    }

    result
}
