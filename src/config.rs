//! Configuration management.
//!
//! Loads database credentials from a JSON (or TOML) file and combines them
//! with host, port, and database name into a connection configuration that
//! is passed explicitly to every component that talks to the database.

use crate::error::{LoaderError, Result};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use url::Url;

/// Default credentials file name, resolved relative to the working directory.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

/// Database user and password read from the credentials file.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Database user.
    pub user: String,

    /// Database password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// On-disk layout: `{"database": {"user": "...", "password": "..."}}`.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    database: Credentials,
}

impl Credentials {
    /// Loads credentials from a file.
    ///
    /// Files ending in `.toml` are parsed as TOML with a `[database]` table;
    /// everything else is parsed as JSON.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoaderError::config(format!(
                "Credentials file '{}' not found. Create it with a 'database' object holding 'user' and 'password'.",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LoaderError::config(format!(
                "Failed to read credentials file '{}': {e}",
                path.display()
            ))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::parse_toml(&content, path)
        } else {
            Self::parse_json(&content, path)
        }
    }

    /// Parses credentials from a JSON string.
    fn parse_json(content: &str, path: &Path) -> Result<Self> {
        serde_json::from_str::<CredentialsFile>(content)
            .map(|file| file.database)
            .map_err(|e| {
                LoaderError::config(format!(
                    "Credentials error in {}:\n  {}",
                    path.display(),
                    e
                ))
            })
    }

    /// Parses credentials from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str::<CredentialsFile>(content)
            .map(|file| file.database)
            .map_err(|e| {
                LoaderError::config(format!(
                    "Credentials error in {}:\n  {}",
                    path.display(),
                    e
                ))
            })
    }
}

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port.
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Login credentials.
    pub credentials: Credentials,
}

impl ConnectionConfig {
    /// Creates a connection config for the given server and database.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            credentials,
        }
    }

    /// Returns a copy of this config pointed at another database on the same server.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }

    /// Converts the connection config to a connection string.
    ///
    /// User and password are percent-encoded.
    pub fn to_connection_string(&self) -> Result<String> {
        let mut url = Url::parse(&format!("postgres://{}:{}", self.host, self.port))
            .map_err(|e| LoaderError::config(format!("Invalid host '{}': {e}", self.host)))?;

        url.set_username(&self.credentials.user)
            .map_err(|_| LoaderError::config("Cannot set user on connection URL"))?;
        url.set_password(Some(&self.credentials.password))
            .map_err(|_| LoaderError::config("Cannot set password on connection URL"))?;
        url.set_path(&format!("/{}", self.database));

        Ok(url.to_string())
    }

    /// Returns a display-safe string (no password) for log output.
    pub fn display_string(&self) -> String {
        format!(
            "{} @ {}:{} as {}",
            self.database, self.host, self.port, self.credentials.user
        )
    }
}

/// Checks that a database name is a plain identifier.
///
/// `CREATE DATABASE` cannot take a bound parameter, so the name is spliced
/// into the statement and must not carry anything but `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_database_name(name: &str) -> Result<()> {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    let re = IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
    });

    if re.is_match(name) {
        Ok(())
    } else {
        Err(LoaderError::config(format!(
            "Invalid database name '{name}'. Use letters, digits and underscores only."
        )))
    }
}
