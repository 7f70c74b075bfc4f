//! Mock database client for testing.
//!
//! Keeps databases, tables and loaded rows in memory and parses COPY input
//! the way the server would for the dataset's text format. Canned query
//! results stand in for plan execution.

use super::{DatabaseClient, LoadSession, QueryResult};
use crate::error::{LoaderError, Result};
use crate::schema::TableSchema;
use crate::source::CopyFormat;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncRead, AsyncReadExt};

/// A loaded row; `None` is SQL NULL.
pub type MockRow = Vec<Option<String>>;

/// Observable state behind a `MockDatabaseClient`.
#[derive(Debug, Default)]
pub struct MockState {
    /// Databases that exist on the mock server.
    pub databases: HashSet<String>,
    /// Committed tables: name to column names.
    pub tables: BTreeMap<String, Vec<String>>,
    /// Committed rows per table.
    pub rows: BTreeMap<String, Vec<MockRow>>,
    /// Tables whose creation fails.
    pub failing_tables: HashSet<String>,
    /// Canned results by exact SQL text (trimmed).
    pub query_results: HashMap<String, QueryResult>,
    /// SQL texts passed to `execute_query`, in order.
    pub executed: Vec<String>,
    /// Number of `CREATE DATABASE` calls.
    pub databases_created: usize,
    /// Whether `create_database` fails.
    pub deny_create_database: bool,
}

/// A mock database client sharing its state with the test that built it.
#[derive(Debug, Clone, Default)]
pub struct MockDatabaseClient {
    state: Arc<Mutex<MockState>>,
}

impl MockDatabaseClient {
    /// Creates a mock server with only the `postgres` database.
    pub fn new() -> Self {
        let client = Self::default();
        client.state().databases.insert("postgres".to_string());
        client
    }

    /// Registers a canned result for a query.
    pub fn with_result(self, sql: &str, result: QueryResult) -> Self {
        self.state()
            .query_results
            .insert(sql.trim().to_string(), result);
        self
    }

    /// Makes creation of the named table fail.
    pub fn with_failing_table(self, name: &str) -> Self {
        self.state().failing_tables.insert(name.to_string());
        self
    }

    /// Locks and returns the shared state.
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn database_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state().databases.contains(name))
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.deny_create_database {
            return Err(LoaderError::query(format!(
                "permission denied to create database '{name}'"
            )));
        }
        if !state.databases.insert(name.to_string()) {
            return Err(LoaderError::query(format!(
                "database \"{name}\" already exists"
            )));
        }
        state.databases_created += 1;
        Ok(())
    }

    async fn begin_load(&self) -> Result<Box<dyn LoadSession>> {
        let state = self.state();
        Ok(Box::new(MockLoadSession {
            shared: Arc::clone(&self.state),
            tables: state.tables.clone(),
            rows: state.rows.clone(),
            failing_tables: state.failing_tables.clone(),
        }))
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let mut state = self.state();
        state.executed.push(sql.to_string());
        state
            .query_results
            .get(sql.trim())
            .cloned()
            .ok_or_else(|| LoaderError::query(format!("ERROR: no mock result for: {}", sql.trim())))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Uncommitted copy of the mock's tables.
struct MockLoadSession {
    shared: Arc<Mutex<MockState>>,
    tables: BTreeMap<String, Vec<String>>,
    rows: BTreeMap<String, Vec<MockRow>>,
    failing_tables: HashSet<String>,
}

#[async_trait]
impl LoadSession for MockLoadSession {
    async fn create_table(&mut self, table: &TableSchema) -> Result<()> {
        if self.failing_tables.contains(table.name) {
            return Err(LoaderError::query(format!(
                "ERROR: type does not exist for table {}",
                table.name
            )));
        }
        let columns = table.column_names().iter().map(|c| c.to_string()).collect();
        self.tables.entry(table.name.to_string()).or_insert(columns);
        self.rows.entry(table.name.to_string()).or_default();
        Ok(())
    }

    async fn copy_in(
        &mut self,
        table: &TableSchema,
        format: &CopyFormat,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64> {
        let Some(columns) = self.tables.get(table.name) else {
            return Err(LoaderError::load(format!(
                "ERROR: relation \"{}\" does not exist",
                table.name
            )));
        };
        let width = columns.len();

        let mut content = String::new();
        source
            .read_to_string(&mut content)
            .await
            .map_err(|e| LoaderError::load(format!("Failed to read source: {e}")))?;

        let mut parsed = Vec::new();
        let skip = usize::from(format.header);
        for (line_no, line) in content.lines().enumerate().skip(skip) {
            let fields: MockRow = line
                .split(format.delimiter)
                .map(|f| (f != format.null).then(|| f.to_string()))
                .collect();
            if fields.len() != width {
                return Err(LoaderError::load(format!(
                    "ERROR: expected {width} columns, got {} on line {}",
                    fields.len(),
                    line_no + 1
                )));
            }
            parsed.push(fields);
        }

        let count = parsed.len() as u64;
        self.rows
            .entry(table.name.to_string())
            .or_default()
            .extend(parsed);
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MockLoadSession {
            shared,
            tables,
            rows,
            ..
        } = *self;
        let mut state = shared.lock().unwrap_or_else(|p| p.into_inner());
        state.tables = tables;
        state.rows = rows;
        Ok(())
    }
}
