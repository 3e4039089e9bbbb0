// src/install/mod.rs

//! On-demand acquisition of the external test executor.
//!
//! - [`probe`] looks candidates up on the search path.
//! - [`Installer`] probes, runs the install command when nothing is found,
//!   and re-probes once afterwards.
//! - [`InstallHandle`] is what construction hands back when installation
//!   runs in the background: callers can poll it or await it.
//!
//! Installation is idempotent. Once a candidate has been found (or
//! installed) the installer keeps that answer for the rest of the process
//! lifetime and later calls return immediately.

pub mod probe;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::InstallError;

pub use probe::{PathProbe, SearchPath, SystemPath, first_match};

/// Candidates, install command and install timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallConfig {
    /// Executable names accepted as "installed", probed in order.
    pub candidates: Vec<String>,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    pub timeout: Duration,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            candidates: vec!["wasmbrowsertest".to_string(), "go_js_wasm_exec".to_string()],
            command: vec![
                "go".to_string(),
                "install".to_string(),
                "github.com/agnivade/wasmbrowsertest@latest".to_string(),
            ],
            timeout: Duration::from_secs(2 * 60),
        }
    }
}

impl InstallConfig {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Observable installer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerState {
    /// Nothing has been checked yet.
    Unchecked,
    /// A candidate was already on the search path.
    Found(PathBuf),
    /// No candidate found; the install command is running.
    Installing,
    /// The install command ran and a candidate is now on the search path.
    Installed(PathBuf),
    Failed(InstallError),
}

impl InstallerState {
    /// Path of the usable executable, if any.
    pub fn ready_path(&self) -> Option<&PathBuf> {
        match self {
            InstallerState::Found(path) | InstallerState::Installed(path) => Some(path),
            _ => None,
        }
    }
}

/// Idempotent installer for one external executable.
#[derive(Debug)]
pub struct Installer {
    config: InstallConfig,
    probe: Arc<dyn PathProbe>,
    state: Mutex<InstallerState>,
    /// Serializes installs so concurrent callers never run the command twice.
    guard: tokio::sync::Mutex<()>,
}

impl Installer {
    pub fn new(config: InstallConfig) -> Self {
        Self::with_probe(config, Arc::new(SystemPath))
    }

    pub fn with_probe(config: InstallConfig, probe: Arc<dyn PathProbe>) -> Self {
        Self {
            config,
            probe,
            state: Mutex::new(InstallerState::Unchecked),
            guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    pub fn state(&self) -> InstallerState {
        self.lock_state().clone()
    }

    /// Make sure one of the candidates is available.
    ///
    /// `deadline` is an optional caller deadline; the install command is
    /// bounded by whichever of it and the configured timeout ends first.
    pub async fn ensure(&self, deadline: Option<Instant>) -> Result<PathBuf, InstallError> {
        if let Some(path) = self.lock_state().ready_path() {
            return Ok(path.clone());
        }

        let _guard = self.guard.lock().await;

        // Another caller may have finished while we waited for the guard.
        if let Some(path) = self.lock_state().ready_path() {
            return Ok(path.clone());
        }

        if let Some((name, path)) = first_match(self.probe.as_ref(), &self.config.candidates) {
            info!(candidate = %name, path = %path.display(), "found test executor");
            self.set_state(InstallerState::Found(path.clone()));
            return Ok(path);
        }

        info!(
            candidates = ?self.config.candidates,
            command = %self.config.command_line(),
            "test executor not found on PATH; installing"
        );
        self.set_state(InstallerState::Installing);

        let result = self.install_and_reprobe(deadline).await;
        match &result {
            Ok(path) => self.set_state(InstallerState::Installed(path.clone())),
            Err(err) => {
                warn!(error = %err, "test executor installation failed");
                self.set_state(InstallerState::Failed(err.clone()));
            }
        }
        result
    }

    async fn install_and_reprobe(&self, deadline: Option<Instant>) -> Result<PathBuf, InstallError> {
        let timeout = effective_timeout(self.config.timeout, deadline);
        run_install_command(&self.config.command, timeout).await?;

        match first_match(self.probe.as_ref(), &self.config.candidates) {
            Some((name, path)) => {
                info!(candidate = %name, path = %path.display(), "installed and found test executor");
                Ok(path)
            }
            None => Err(InstallError::NotFoundAfterInstall {
                candidates: self.config.candidates.clone(),
            }),
        }
    }

    fn set_state(&self, next: InstallerState) {
        let mut state = self.lock_state();
        if state.ready_path().is_some() {
            debug!(?next, "installer already satisfied; keeping current state");
            return;
        }
        *state = next;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, InstallerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shorter of the configured timeout and the time left until `deadline`.
pub fn effective_timeout(configured: Duration, deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(deadline) => configured.min(deadline.saturating_duration_since(Instant::now())),
        None => configured,
    }
}

async fn run_install_command(command: &[String], timeout: Duration) -> Result<(), InstallError> {
    let command_line = command.join(" ");
    let Some((program, args)) = command.split_first() else {
        return Err(InstallError::CommandFailed {
            command: command_line,
            detail: "empty install command".to_string(),
        });
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = %command_line, ?timeout, "running install command");

    // On timeout the output future is dropped, which kills the child.
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            return Err(InstallError::CommandFailed {
                command: command_line,
                detail: err.to_string(),
            });
        }
        Err(_) => {
            return Err(InstallError::TimedOut {
                command: command_line,
                timeout,
            });
        }
    };

    if output.status.success() {
        info!(command = %command_line, "install command finished");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let detail = if stderr.is_empty() {
        output.status.to_string()
    } else {
        format!("{}: {}", output.status, stderr)
    };
    Err(InstallError::CommandFailed {
        command: command_line,
        detail,
    })
}

/// Handle to an installation running on its own Tokio task.
#[derive(Debug, Clone)]
pub struct InstallHandle {
    installer: Arc<Installer>,
    rx: watch::Receiver<Option<Result<PathBuf, InstallError>>>,
}

impl InstallHandle {
    /// Start `ensure` in the background and return immediately.
    pub fn spawn(installer: Arc<Installer>) -> Self {
        let (tx, rx) = watch::channel(None);
        let task_installer = Arc::clone(&installer);

        tokio::spawn(async move {
            let result = task_installer.ensure(None).await;
            if let Err(err) = &result {
                warn!(error = %err, "background install of test executor failed");
            }
            let _ = tx.send(Some(result));
        });

        Self { installer, rx }
    }

    /// Current installer state, without waiting.
    pub fn state(&self) -> InstallerState {
        self.installer.state()
    }

    /// True once the background installation has produced a result.
    pub fn is_finished(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the background installation to finish.
    pub async fn wait(&mut self) -> Result<PathBuf, InstallError> {
        let done = self
            .rx
            .wait_for(|result| result.is_some())
            .await
            .map_err(|e| InstallError::Aborted(e.to_string()))?;

        match &*done {
            Some(result) => result.clone(),
            None => Err(InstallError::Aborted("no result published".to_string())),
        }
    }
}
