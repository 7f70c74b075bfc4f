//! Plan runner: execute each SQL file in a directory and write its rows to a
//! matching text file.
//!
//! Unlike the provisioner, any failure here ends the whole run. Output files
//! written before the failure are left in place.

use crate::db::DatabaseClient;
use crate::error::{LoaderError, Result};
use crate::safety::classify_plan;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

/// Default directory of plan files.
pub const DEFAULT_PLANS_DIR: &str = "Plans";

/// Default directory for result files.
pub const DEFAULT_OUTPUT_DIR: &str = "Output";

/// Extension given to result files.
pub const OUTPUT_EXTENSION: &str = "txt";

/// Where plans are read from and results written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    pub plans_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            plans_dir: PathBuf::from(DEFAULT_PLANS_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// Result of running one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    pub plan: PathBuf,
    pub output: PathBuf,
    pub rows: usize,
}

/// Lists the plan files in `dir`, sorted by file name.
///
/// Only regular files are returned; subdirectories are ignored.
pub async fn list_plans(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LoaderError::io(dir, e))?;

    let mut plans = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LoaderError::io(dir, e))?
    {
        let path = entry.path();
        // Follows symlinks, so a linked plan file counts as a file.
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| LoaderError::io(&path, e))?;
        if metadata.is_file() {
            plans.push(path);
        } else {
            debug!("Ignoring non-file entry {}", path.display());
        }
    }

    plans.sort();
    Ok(plans)
}

/// Maps `Plans/q1.sql` to `Output/q1.txt`.
pub fn output_path_for(plan: &Path, output_dir: &Path) -> PathBuf {
    let mut name = plan.file_stem().unwrap_or(plan.as_os_str()).to_os_string();
    name.push(".");
    name.push(OUTPUT_EXTENSION);
    output_dir.join(name)
}

/// Runs one plan file and writes its result file.
pub async fn run_plan(
    client: &dyn DatabaseClient,
    plan: &Path,
    output_dir: &Path,
) -> Result<PlanOutcome> {
    let sql = tokio::fs::read_to_string(plan)
        .await
        .map_err(|e| LoaderError::io(plan, e))?;

    let kind = classify_plan(&sql);
    if let Some(warning) = kind.warning() {
        warn!("{}: {}", plan.display(), warning);
    }

    let result = client
        .execute_query(&sql)
        .await
        .map_err(|e| match e {
            LoaderError::Query(msg) => LoaderError::query(format!("{}: {msg}", plan.display())),
            other => other,
        })?;
    debug!(
        "{} returned {} rows in {:?}",
        plan.display(),
        result.row_count(),
        result.execution_time
    );

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| LoaderError::io(output_dir, e))?;

    let output = output_path_for(plan, output_dir);
    let file = tokio::fs::File::create(&output)
        .await
        .map_err(|e| LoaderError::io(&output, e))?;
    let mut writer = BufWriter::new(file);
    for line in result.render_lines() {
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| LoaderError::io(&output, e))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| LoaderError::io(&output, e))?;
    }
    writer
        .flush()
        .await
        .map_err(|e| LoaderError::io(&output, e))?;

    Ok(PlanOutcome {
        plan: plan.to_path_buf(),
        output,
        rows: result.row_count(),
    })
}

/// Runs every plan in order, stopping at the first failure.
pub async fn run_plans(client: &dyn DatabaseClient, options: &PlanOptions) -> Result<Vec<PlanOutcome>> {
    let plans = list_plans(&options.plans_dir).await?;
    if plans.is_empty() {
        warn!("No plan files found in {}", options.plans_dir.display());
    }

    let mut outcomes = Vec::with_capacity(plans.len());
    for plan in &plans {
        info!("Running plan: {}", plan.display());
        let outcome = run_plan(client, plan, &options.output_dir).await?;
        info!("Wrote {} rows to {}", outcome.rows, outcome.output.display());
        outcomes.push(outcome);
    }

    info!(
        "Ran {} plans, {} rows written",
        outcomes.len(),
        outcomes.iter().map(|o| o.rows).sum::<usize>()
    );
    Ok(outcomes)
}
