//! Command-line argument parsing for both binaries.
//!
//! Uses clap derive; server settings fall back to the usual `PG*`
//! environment variables.

use crate::config::{ConnectionConfig, Credentials, DEFAULT_CREDENTIALS_FILE, DEFAULT_PORT};
use crate::decompress::DEFAULT_SCRIPT;
use crate::error::Result;
use crate::plans::{PlanOptions, DEFAULT_OUTPUT_DIR, DEFAULT_PLANS_DIR};
use crate::provision::{ProvisionOptions, DEFAULT_ADMIN_DB, DEFAULT_TARGET_DB};
use crate::source::{DEFAULT_DATA_DIR, DEFAULT_SOURCE_FILES};
use clap::{Args, Parser};
use std::path::{Path, PathBuf};

/// Server and credential options shared by both binaries.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Credentials file holding `database.user` and `database.password`
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CREDENTIALS_FILE)]
    pub credentials: PathBuf,

    /// Database host
    #[arg(short = 'H', long, value_name = "HOST", env = "PGHOST", default_value = "localhost")]
    pub host: String,

    /// Database port
    #[arg(short = 'p', long, value_name = "PORT", env = "PGPORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ConnectionArgs {
    /// Loads credentials and builds a connection config for `database`.
    pub fn connection_config(&self, database: &str) -> Result<ConnectionConfig> {
        let credentials = Credentials::load_from_file(&self.credentials)?;
        Ok(ConnectionConfig::new(
            self.host.clone(),
            self.port,
            database,
            credentials,
        ))
    }
}

/// Logging options shared by both binaries.
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl LogArgs {
    pub fn init(&self) {
        crate::logging::init(self.log_file.as_deref(), self.verbose);
    }
}

/// Create the IMDb database and tables, then bulk-load the TSV dumps.
#[derive(Parser, Debug)]
#[command(name = "imdb-provision")]
#[command(version, about, long_about = None)]
pub struct ProvisionCli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub log: LogArgs,

    /// Administrative database used to create the target
    #[arg(long, value_name = "NAME", default_value = DEFAULT_ADMIN_DB)]
    pub admin_db: String,

    /// Database to create and load
    #[arg(short = 'd', long, value_name = "NAME", default_value = DEFAULT_TARGET_DB)]
    pub target_db: String,

    /// Directory holding the decompressed TSV files
    #[arg(long, value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Source file to load (repeatable; defaults to the five IMDb dumps)
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub files: Vec<String>,

    /// Decompression script run before loading
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SCRIPT)]
    pub script: PathBuf,

    /// Do not run the decompression script
    #[arg(long)]
    pub skip_decompress: bool,
}

impl ProvisionCli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Script to run, unless decompression is disabled.
    pub fn script(&self) -> Option<&Path> {
        (!self.skip_decompress).then_some(self.script.as_path())
    }

    /// Provisioning options derived from the arguments.
    pub fn options(&self) -> ProvisionOptions {
        let files = if self.files.is_empty() {
            DEFAULT_SOURCE_FILES.iter().map(|f| f.to_string()).collect()
        } else {
            self.files.clone()
        };

        ProvisionOptions {
            target_db: self.target_db.clone(),
            data_dir: self.data_dir.clone(),
            files,
            ..ProvisionOptions::default()
        }
    }
}

/// Run every SQL plan in a directory and write each result set to a text file.
#[derive(Parser, Debug)]
#[command(name = "imdb-run-plans")]
#[command(version, about, long_about = None)]
pub struct PlanCli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub log: LogArgs,

    /// Database to run the plans against
    #[arg(short = 'd', long, value_name = "NAME", env = "PGDATABASE", default_value = DEFAULT_TARGET_DB)]
    pub database: String,

    /// Directory of plan files
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PLANS_DIR)]
    pub plans_dir: PathBuf,

    /// Directory for result files
    #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,
}

impl PlanCli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Plan options derived from the arguments.
    pub fn options(&self) -> PlanOptions {
        PlanOptions {
            plans_dir: self.plans_dir.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}
