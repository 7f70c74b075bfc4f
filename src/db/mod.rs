//! Database abstraction layer.
//!
//! Provides trait-based interfaces for the handful of operations the
//! provisioner and plan runner need, so the orchestration can run against
//! PostgreSQL or an in-memory mock.

mod mock;
mod postgres;
mod types;

pub use mock::{MockDatabaseClient, MockState};
pub use postgres::PostgresClient;
pub use types::{render_row, ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::schema::TableSchema;
use crate::source::CopyFormat;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Creates a database client for the given configuration.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    let client = PostgresClient::connect(config).await?;
    Ok(Box::new(client))
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with LoaderError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Returns true if a database with this name exists on the server.
    async fn database_exists(&self, name: &str) -> Result<bool>;

    /// Creates a database. The name must already be validated.
    async fn create_database(&self, name: &str) -> Result<()>;

    /// Opens a transaction for table creation and bulk loading.
    async fn begin_load(&self) -> Result<Box<dyn LoadSession>>;

    /// Executes a SQL query and returns the full result set.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// A transaction in which tables are created and files are loaded.
///
/// Each `create_table` and `copy_in` call is isolated: when it fails, only
/// its own work is undone and the session stays usable. Nothing is visible
/// to other connections until `commit`.
#[async_trait]
pub trait LoadSession: Send {
    /// Creates the table if it does not exist.
    async fn create_table(&mut self, table: &TableSchema) -> Result<()>;

    /// Streams delimited text from `source` into `table`, returning the
    /// number of rows copied.
    async fn copy_in(
        &mut self,
        table: &TableSchema,
        format: &CopyFormat,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64>;

    /// Commits all successful work.
    async fn commit(self: Box<Self>) -> Result<()>;
}
