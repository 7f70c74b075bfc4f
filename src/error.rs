//! Error types for the loader.
//!
//! Library code returns these; only the binaries decide to exit the process.

use std::path::Path;
use thiserror::Error;

/// Main error type for provisioning and plan execution.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution errors (syntax errors, missing relations, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Bulk-copy failures for a single source file.
    #[error("Load error: {0}")]
    Load(String),

    /// Configuration errors (missing credentials file, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors while reading inputs or writing outputs.
    #[error("I/O error: {0}")]
    Io(String),

    /// External script failures.
    #[error("Script error: {0}")]
    Script(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LoaderError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a load error with the given message.
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an I/O error that names the path involved.
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io(format!("{}: {err}", path.display()))
    }

    /// Creates a script error with the given message.
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Load(_) => "Load Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
            Self::Script(_) => "Script Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using LoaderError.
pub type Result<T> = std::result::Result<T, LoaderError>;
