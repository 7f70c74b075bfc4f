//! Runs the external script that unpacks the dataset archives.
//!
//! The step is best-effort: a missing script, a missing shell or a failing
//! script is reported and the provisioner carries on with whatever files are
//! already in place.

use crate::error::{LoaderError, Result};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Default script name, resolved relative to the working directory.
pub const DEFAULT_SCRIPT: &str = "decompress.sh";

/// What happened when the script was triggered.
#[derive(Debug)]
pub enum ScriptOutcome {
    /// The script file does not exist.
    Missing,
    /// No `bash` on `PATH` (non-Unix hosts only).
    ShellNotFound,
    /// The script exited with status zero.
    Succeeded { stdout: String },
    /// The script ran and exited non-zero.
    Failed { status: ExitStatus, stderr: String },
}

/// Runs the script and logs the outcome.
///
/// Errors starting the process are logged and yield `None`;
/// this never fails the caller.
pub async fn run_decompression_script(script: &Path) -> Option<ScriptOutcome> {
    match run_script(script).await {
        Ok(outcome) => {
            match &outcome {
                ScriptOutcome::Missing => warn!(
                    "Script '{}' not found; assuming data is already decompressed",
                    script.display()
                ),
                ScriptOutcome::ShellNotFound => {
                    warn!("'bash' not found on PATH; skipping '{}'", script.display())
                }
                ScriptOutcome::Succeeded { stdout } => {
                    info!("Script '{}' finished", script.display());
                    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
                        info!("  {line}");
                    }
                }
                ScriptOutcome::Failed { status, stderr } => {
                    error!("Script '{}' failed ({status})", script.display());
                    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                        error!("  {line}");
                    }
                }
            }
            Some(outcome)
        }
        Err(e) => {
            error!("{}: {}", e.category(), e);
            None
        }
    }
}

/// Runs the script, capturing its output.
pub async fn run_script(script: &Path) -> Result<ScriptOutcome> {
    if !script.is_file() {
        return Ok(ScriptOutcome::Missing);
    }

    let Some(mut command) = script_command(script)? else {
        return Ok(ScriptOutcome::ShellNotFound);
    };

    info!("Running {}...", script.display());
    let output = command
        .output()
        .await
        .map_err(|e| LoaderError::script(format!("Failed to start '{}': {e}", script.display())))?;

    if output.status.success() {
        Ok(ScriptOutcome::Succeeded {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    } else {
        Ok(ScriptOutcome::Failed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Marks the script executable and runs it directly.
#[cfg(unix)]
fn script_command(script: &Path) -> Result<Option<Command>> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(script)
        .map_err(|e| LoaderError::script(format!("{}: {e}", script.display())))?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(permissions.mode() | 0o100);
    std::fs::set_permissions(script, permissions).map_err(|e| {
        LoaderError::script(format!(
            "Cannot mark '{}' executable: {e}",
            script.display()
        ))
    })?;

    // A bare file name would be looked up on PATH instead of the working directory.
    let program = if script.components().count() == 1 {
        Path::new(".").join(script)
    } else {
        script.to_path_buf()
    };

    Ok(Some(Command::new(program)))
}

/// Runs the script through `bash` found on PATH.
#[cfg(not(unix))]
fn script_command(script: &Path) -> Result<Option<Command>> {
    Ok(find_on_path("bash").map(|bash| {
        let mut command = Command::new(bash);
        command.arg(script);
        command
    }))
}

/// Finds an executable on PATH.
#[cfg_attr(unix, allow(dead_code))]
fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    let mut candidates = vec![program.to_string()];
    if cfg!(windows) {
        candidates.insert(0, format!("{program}.exe"));
    }

    std::env::split_paths(&paths)
        .flat_map(|dir| {
            candidates
                .iter()
                .map(move |name| dir.join(name))
                .collect::<Vec<_>>()
        })
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_script() {
        let dir = tempdir().unwrap();
        let outcome = run_script(&dir.path().join("decompress.sh")).await.unwrap();
        assert!(matches!(outcome, ScriptOutcome::Missing));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_script_captures_stdout() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("decompress.sh");
        std::fs::write(&script, "#!/bin/sh\necho unpacked\n").unwrap();

        let outcome = run_script(&script).await.unwrap();
        match outcome {
            ScriptOutcome::Succeeded { stdout } => assert_eq!(stdout.trim(), "unpacked"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_script_captures_stderr() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("decompress.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'gzip: not found' >&2\nexit 3\n").unwrap();

        let outcome = run_script(&script).await.unwrap();
        match outcome {
            ScriptOutcome::Failed { status, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert!(stderr.contains("gzip: not found"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_script_is_not_fatal() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("decompress.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 1\n").unwrap();

        let outcome = run_decompression_script(&script).await;
        assert!(matches!(outcome, Some(ScriptOutcome::Failed { .. })));
    }

    #[test]
    fn test_find_on_path_missing_program() {
        assert!(find_on_path("definitely-not-a-real-program-xyz").is_none());
    }
}
