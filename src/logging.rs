//! Logging configuration.
//!
//! Both binaries log progress through `tracing`. Output always goes to
//! stderr; when a log file is given, a copy of every event is written there
//! too.

use std::fs::{self, File};
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Builds the filter from `RUST_LOG`, falling back to `info` (or `debug`
/// when verbose output is requested).
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Composes the console layer with an optional file layer.
fn subscriber<C, F>(filter: EnvFilter, console: C, file: Option<F>) -> impl Subscriber + Send + Sync + 'static
where
    C: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    F: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let file_layer = file.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false) // No ANSI colors in file output
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(console).with_target(false))
        .with(file_layer)
}

/// Opens the log file, truncating it.
fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            return None;
        }
    }

    match File::create(path) {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            None
        }
    }
}

/// Initializes logging to stderr, plus `log_file` when given.
///
/// A log file that cannot be created is reported and skipped.
pub fn init(log_file: Option<&Path>, verbose: bool) {
    let file = log_file.and_then(open_log_file);
    subscriber(env_filter(verbose), std::io::stderr, file).init();
}
