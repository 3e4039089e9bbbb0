// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::ProcessSpec;
use crate::install::InstallConfig;

/// Directory used when no directory (or `"."`) is given.
pub const DEFAULT_TEST_DIR: &str = "wasm_test";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [install]
/// candidates = ["wasmbrowsertest", "go_js_wasm_exec"]
/// command = ["go", "install", "github.com/agnivade/wasmbrowsertest@latest"]
/// timeout = "2m"
///
/// [run]
/// dir = "wasm_test"
/// program = "go"
/// args = ["test", "-v"]
/// timeout = "10m"
///
/// [run.env]
/// GOOS = "js"
/// GOARCH = "wasm"
/// ```
///
/// All sections are optional. This is the unvalidated form; convert it with
/// `ConfigFile::try_from`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub install: InstallSection,

    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub shim: ShimSection,
}

/// `[install]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallSection {
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,

    /// Program and arguments, not a shell string.
    #[serde(default = "default_install_command")]
    pub command: Vec<String>,

    #[serde(default = "default_install_timeout")]
    pub timeout: String,
}

fn default_candidates() -> Vec<String> {
    InstallConfig::default().candidates
}

fn default_install_command() -> Vec<String> {
    InstallConfig::default().command
}

fn default_install_timeout() -> String {
    "2m".to_string()
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            command: default_install_command(),
            timeout: default_install_timeout(),
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    #[serde(default = "default_dir")]
    pub dir: String,

    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Overrides applied on top of the inherited environment.
    #[serde(default = "default_env")]
    pub env: BTreeMap<String, String>,

    #[serde(default = "default_run_timeout")]
    pub timeout: String,

    /// Time given to the output readers after the process exits.
    #[serde(default = "default_drain_grace")]
    pub drain_grace: String,
}

fn default_dir() -> String {
    DEFAULT_TEST_DIR.to_string()
}

fn default_program() -> String {
    ProcessSpec::default().program
}

fn default_args() -> Vec<String> {
    ProcessSpec::default().args
}

fn default_env() -> BTreeMap<String, String> {
    ProcessSpec::default().env.into_iter().collect()
}

fn default_run_timeout() -> String {
    "10m".to_string()
}

fn default_drain_grace() -> String {
    "2s".to_string()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            program: default_program(),
            args: default_args(),
            env: default_env(),
            timeout: default_run_timeout(),
            drain_grace: default_drain_grace(),
        }
    }
}

/// `[shim]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShimSection {
    /// Create `go_js_wasm_exec -> wasmbrowsertest` before running.
    #[serde(default = "default_shim_enabled")]
    pub enabled: bool,
}

fn default_shim_enabled() -> bool {
    true
}

impl Default for ShimSection {
    fn default() -> Self {
        Self {
            enabled: default_shim_enabled(),
        }
    }
}

/// Validated configuration, ready to drive a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub install: InstallConfig,
    /// `process.dir` is always set.
    pub process: ProcessSpec,
    pub run_timeout: Duration,
    pub shim: bool,
}

impl ConfigFile {
    /// Construct without validation. Callers go through `TryFrom`.
    pub(crate) fn new_unchecked(
        install: InstallConfig,
        process: ProcessSpec,
        run_timeout: Duration,
        shim: bool,
    ) -> Self {
        Self {
            install,
            process,
            run_timeout,
            shim,
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.process
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEST_DIR))
    }

    /// Point the run at `dir`; `""` and `"."` mean the default test dir.
    pub fn set_dir(&mut self, dir: &str) {
        self.process.dir = Some(normalize_dir(dir));
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let mut process = ProcessSpec {
            dir: Some(PathBuf::from(DEFAULT_TEST_DIR)),
            ..ProcessSpec::default()
        };
        // Same order as the `[run.env]` table after loading.
        process.env.sort();

        Self {
            install: InstallConfig::default(),
            process,
            run_timeout: Duration::from_secs(10 * 60),
            shim: true,
        }
    }
}

/// `""` and `"."` select [`DEFAULT_TEST_DIR`]; anything else is kept.
pub fn normalize_dir(dir: &str) -> PathBuf {
    match dir.trim() {
        "" | "." => PathBuf::from(DEFAULT_TEST_DIR),
        other => PathBuf::from(other),
    }
}
