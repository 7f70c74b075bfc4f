//! IMDb loader - provision a PostgreSQL database from the IMDb TSV dumps
//! and run SQL plans against it.
//!
//! This library backs the `imdb-provision` and `imdb-run-plans` binaries
//! and exposes the core modules for integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod decompress;
pub mod error;
pub mod logging;
pub mod plans;
pub mod provision;
pub mod safety;
pub mod schema;
pub mod source;
