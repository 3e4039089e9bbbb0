// src/errors.rs

//! Crate-wide error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::engine::RunReport;

/// Failures of the dependency installer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// The install command succeeded but none of the candidates is on the
    /// search path afterwards (usually the install directory is not on PATH).
    #[error("installed but none of {candidates:?} found on PATH; ensure the install directory (e.g. GOBIN or GOPATH/bin) is on PATH")]
    NotFoundAfterInstall { candidates: Vec<String> },

    #[error("install command `{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("install command `{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    /// The background install task went away without reporting a result.
    #[error("installer task ended without a result: {0}")]
    Aborted(String),
}

/// Failures to start or wire up the child process.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("child {0} pipe was not captured")]
    MissingPipe(&'static str),

    #[error("runner task failed: {0}")]
    Join(String),
}

#[derive(Error, Debug)]
pub enum WasmtestError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("no wasm test files found in {}", .0.display())]
    NoTests(PathBuf),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("{0}")]
    RunFailed(Box<RunReport>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WasmtestError>;
