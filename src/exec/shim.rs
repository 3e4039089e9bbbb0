// src/exec/shim.rs

//! `go_js_wasm_exec` shim.
//!
//! `go test` with `GOOS=js` looks for an executor named `go_js_wasm_exec`.
//! When only `wasmbrowsertest` is installed we link the former to the
//! latter. Problems here are reported as warnings: the test run is still
//! attempted and will fail on its own if the executor is really missing.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::message::{Message, ProgressSink};

pub const EXEC_SHIM_NAME: &str = "go_js_wasm_exec";
pub const BROWSER_TEST_NAME: &str = "wasmbrowsertest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimStatus {
    AlreadyPresent,
    Created,
    /// `wasmbrowsertest` itself is not in the bin dir.
    TargetMissing,
    LinkFailed,
}

/// `$GOPATH/bin`, falling back to `$(go env GOPATH)/bin`.
///
/// Only the first entry of a multi-entry GOPATH is used, as `go install`
/// does.
pub async fn resolve_go_bin_dir() -> Option<PathBuf> {
    let gopath = match std::env::var_os("GOPATH").filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => go_env_gopath().await?.into(),
    };

    let first = std::env::split_paths(&gopath).next()?;
    Some(first.join("bin"))
}

async fn go_env_gopath() -> Option<String> {
    let output = match Command::new("go").args(["env", "GOPATH"]).output().await {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            debug!(status = %output.status, "`go env GOPATH` failed");
            return None;
        }
        Err(e) => {
            debug!(error = %e, "could not run `go env GOPATH`");
            return None;
        }
    };

    let gopath = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!gopath.is_empty()).then_some(gopath)
}

/// Ensure `bin_dir/go_js_wasm_exec` exists, linking it to `wasmbrowsertest`.
pub fn ensure_exec_shim(bin_dir: &Path, sink: &dyn ProgressSink) -> ShimStatus {
    let shim = bin_dir.join(EXEC_SHIM_NAME);
    let target = bin_dir.join(BROWSER_TEST_NAME);

    if shim.exists() {
        sink.emit(Message::info(format!("{EXEC_SHIM_NAME} already exists")));
        return ShimStatus::AlreadyPresent;
    }

    if !target.exists() {
        warn!(path = %target.display(), "wasmbrowsertest not found; installation may still be in progress");
        sink.emit(Message::warning(format!(
            "{BROWSER_TEST_NAME} not found, tests may fail if not installed"
        )));
        return ShimStatus::TargetMissing;
    }

    match link(&target, &shim) {
        Ok(()) => {
            info!(shim = %shim.display(), target = %target.display(), "created exec shim");
            sink.emit(Message::info(format!(
                "created {EXEC_SHIM_NAME} -> {BROWSER_TEST_NAME} symlink"
            )));
            ShimStatus::Created
        }
        Err(e) => {
            warn!(shim = %shim.display(), error = %e, "failed to create exec shim");
            sink.emit(Message::warning(format!(
                "failed to create {EXEC_SHIM_NAME} symlink: {e}"
            )));
            ShimStatus::LinkFailed
        }
    }
}

#[cfg(unix)]
fn link(target: &Path, shim: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, shim)
}

#[cfg(not(unix))]
fn link(_target: &Path, _shim: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks are only created on unix",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::message::MessageLog;
    use crate::types::DiagnosticLevel;

    fn levels(log: &MessageLog) -> Vec<DiagnosticLevel> {
        log.snapshot()
            .into_iter()
            .filter_map(|m| match m {
                Message::Diagnostic { level, .. } => Some(level),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn links_shim_to_wasmbrowsertest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BROWSER_TEST_NAME), "bin").unwrap();
        let log = MessageLog::new();

        assert_eq!(ensure_exec_shim(dir.path(), &log), ShimStatus::Created);

        let shim = dir.path().join(EXEC_SHIM_NAME);
        assert_eq!(
            std::fs::read_link(&shim).unwrap(),
            dir.path().join(BROWSER_TEST_NAME)
        );
        assert_eq!(levels(&log), vec![DiagnosticLevel::Info]);

        // Second call sees the shim and leaves it alone.
        assert_eq!(ensure_exec_shim(dir.path(), &log), ShimStatus::AlreadyPresent);
    }

    #[test]
    fn missing_target_is_a_warning_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::new();

        assert_eq!(ensure_exec_shim(dir.path(), &log), ShimStatus::TargetMissing);
        assert_eq!(levels(&log), vec![DiagnosticLevel::Warning]);
        assert!(!dir.path().join(EXEC_SHIM_NAME).exists());
    }

    #[test]
    fn dangling_shim_reports_link_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BROWSER_TEST_NAME), "bin").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join(EXEC_SHIM_NAME)).unwrap();
        let log = MessageLog::new();

        assert_eq!(ensure_exec_shim(dir.path(), &log), ShimStatus::LinkFailed);
        assert_eq!(levels(&log), vec![DiagnosticLevel::Warning]);
    }
}
