//! Database provisioning: create the target database, its tables, and load
//! the source files into them.
//!
//! Fatal problems (connecting, creating the database, committing) come back
//! as `Err`. Per-table and per-file problems are logged, recorded in the
//! `ProvisionReport`, and the batch moves on.

use crate::config::{validate_database_name, ConnectionConfig};
use crate::db::{self, DatabaseClient, LoadSession};
use crate::error::{LoaderError, Result};
use crate::schema::SchemaRegistry;
use crate::source::{CopyFormat, SourceFile, DEFAULT_DATA_DIR, DEFAULT_SOURCE_FILES};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Default administrative database used to create the target.
pub const DEFAULT_ADMIN_DB: &str = "postgres";

/// Default target database.
pub const DEFAULT_TARGET_DB: &str = "imdb";

/// What the provisioner should build and load.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub target_db: String,
    pub data_dir: PathBuf,
    pub files: Vec<String>,
    pub format: CopyFormat,
    pub registry: SchemaRegistry,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            target_db: DEFAULT_TARGET_DB.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            files: DEFAULT_SOURCE_FILES.iter().map(|f| f.to_string()).collect(),
            format: CopyFormat::imdb_tsv(),
            registry: SchemaRegistry::imdb(),
        }
    }
}

impl ProvisionOptions {
    /// Source files resolved against the data directory.
    pub fn sources(&self) -> Vec<SourceFile> {
        self.files
            .iter()
            .map(|f| SourceFile::new(&self.data_dir, f.as_str()))
            .collect()
    }
}

/// Whether the target database had to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseStatus {
    Existed,
    Created,
}

/// Why a source file was not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file is not in the data directory.
    MissingFile(PathBuf),
    /// The derived table has no entry in the schema registry.
    UnknownTable(String),
}

/// A source file loaded into its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub file_name: String,
    pub table_name: String,
    pub rows: u64,
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub database: Option<DatabaseStatus>,
    pub tables_ready: Vec<String>,
    pub tables_failed: Vec<(String, String)>,
    pub loaded: Vec<LoadedFile>,
    pub skipped: Vec<(String, SkipReason)>,
    pub failed: Vec<(String, String)>,
}

impl ProvisionReport {
    /// True when every table was created and every file loaded.
    pub fn is_clean(&self) -> bool {
        self.tables_failed.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }

    /// Total rows copied across all files.
    pub fn total_rows(&self) -> u64 {
        self.loaded.iter().map(|l| l.rows).sum()
    }

    /// Logs a one-block summary of the run.
    pub fn log_summary(&self) {
        info!(
            "Summary: {} tables ready, {} files loaded ({} rows), {} skipped, {} failed",
            self.tables_ready.len(),
            self.loaded.len(),
            self.total_rows(),
            self.skipped.len(),
            self.failed.len()
        );
        for (table, err) in &self.tables_failed {
            warn!("  table {table}: {err}");
        }
        for (file, reason) in &self.skipped {
            match reason {
                SkipReason::MissingFile(path) => {
                    warn!("  skipped {file}: not found at {}", path.display())
                }
                SkipReason::UnknownTable(table) => {
                    warn!("  skipped {file}: no schema for table '{table}'")
                }
            }
        }
        for (file, err) in &self.failed {
            warn!("  failed {file}: {err}");
        }
    }
}

/// Runs the full provisioning pipeline against the server in `admin_config`.
///
/// Opens one connection to the administrative database to make sure the
/// target exists, closes it, then opens a second connection to the target
/// for table creation and loading.
pub async fn provision(
    admin_config: &ConnectionConfig,
    options: &ProvisionOptions,
) -> Result<ProvisionReport> {
    validate_database_name(&options.target_db)?;

    info!("Setting up database '{}'", options.target_db);
    let admin = db::connect(admin_config).await?;
    info!("Connected to administrative database '{}'", admin_config.database);

    let status = ensure_database(admin.as_ref(), &options.target_db).await;
    admin.close().await?;
    let status = status?;

    let target_config = admin_config.with_database(&options.target_db);
    info!("Connecting to '{}' and loading data", options.target_db);
    let target = db::connect(&target_config).await?;

    let report = load_target(target.as_ref(), options).await;
    target.close().await?;

    let mut report = report?;
    report.database = Some(status);
    Ok(report)
}

/// Creates the target database unless it already exists.
pub async fn ensure_database(admin: &dyn DatabaseClient, name: &str) -> Result<DatabaseStatus> {
    validate_database_name(name)?;

    if admin.database_exists(name).await? {
        info!("Database '{name}' already exists");
        return Ok(DatabaseStatus::Existed);
    }

    info!("Creating database '{name}'...");
    admin.create_database(name).await?;
    info!("Database '{name}' created");
    Ok(DatabaseStatus::Created)
}

/// Creates every registry table and loads every source file in one
/// transaction, committing once at the end.
pub async fn load_target(
    client: &dyn DatabaseClient,
    options: &ProvisionOptions,
) -> Result<ProvisionReport> {
    let mut report = ProvisionReport::default();
    let mut session = client.begin_load().await?;

    create_tables(session.as_mut(), &options.registry, &mut report).await;
    load_sources(
        session.as_mut(),
        &options.registry,
        &options.format,
        &options.sources(),
        &mut report,
    )
    .await;

    session.commit().await?;
    info!("All operations complete and committed");
    Ok(report)
}

/// Issues `CREATE TABLE IF NOT EXISTS` for every registry entry.
///
/// A failing table is logged and recorded; the remaining tables still run.
pub async fn create_tables(
    session: &mut dyn LoadSession,
    registry: &SchemaRegistry,
    report: &mut ProvisionReport,
) {
    for table in registry.tables() {
        match session.create_table(table).await {
            Ok(()) => {
                info!("Table '{}' checked/created", table.name);
                report.tables_ready.push(table.name.to_string());
            }
            Err(e) => {
                error!("Error creating table {}: {}", table.name, e);
                report.tables_failed.push((table.name.to_string(), e.to_string()));
            }
        }
    }
}

/// Bulk-loads each source file into its table.
///
/// Files with no registry entry or missing on disk are skipped; a failed
/// COPY is rolled back on its own and the next file is attempted.
pub async fn load_sources(
    session: &mut dyn LoadSession,
    registry: &SchemaRegistry,
    format: &CopyFormat,
    sources: &[SourceFile],
    report: &mut ProvisionReport,
) {
    for source in sources {
        let Some(table) = registry.get(&source.table_name) else {
            error!(
                "Schema for {} not found in registry. Skipping {}",
                source.table_name, source.file_name
            );
            report.skipped.push((
                source.file_name.clone(),
                SkipReason::UnknownTable(source.table_name.clone()),
            ));
            continue;
        };

        debug!(
            "Looking for {} at {}",
            source.file_name,
            std::path::absolute(&source.path)
                .unwrap_or_else(|_| source.path.clone())
                .display()
        );

        let mut file = match tokio::fs::File::open(&source.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!("File not found at {}. Skipping", source.path.display());
                report.skipped.push((
                    source.file_name.clone(),
                    SkipReason::MissingFile(source.path.clone()),
                ));
                continue;
            }
            Err(e) => {
                let err = LoaderError::io(&source.path, e);
                error!("Error opening {}: {}", source.file_name, err);
                report.failed.push((source.file_name.clone(), err.to_string()));
                continue;
            }
        };

        info!("Loading {} into {}...", source.file_name, table.name);
        match session.copy_in(table, format, &mut file).await {
            Ok(rows) => {
                info!("Load complete: {rows} rows into {}", table.name);
                report.loaded.push(LoadedFile {
                    file_name: source.file_name.clone(),
                    table_name: table.name.to_string(),
                    rows,
                });
            }
            Err(e) => {
                error!("Error loading {}: {}", source.file_name, e);
                report.failed.push((source.file_name.clone(), e.to_string()));
            }
        }
    }
}
