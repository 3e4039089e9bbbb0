// src/exec/backend.rs

//! Pluggable install and execution backends.
//!
//! The supervisor talks to an [`InstallBackend`] and an [`ExecutorBackend`]
//! instead of the concrete installer and process runner. Production code
//! uses [`Installer`] and [`RealExecutorBackend`]; tests can provide their
//! own implementations that never touch `PATH` or spawn processes.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::{InstallError, ProcessError};
use crate::exec::runner::{ProcessSpec, RunExit, run_process};
use crate::exec::shim::{ensure_exec_shim, resolve_go_bin_dir};
use crate::install::Installer;
use crate::message::SharedSink;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Makes sure the test executor is available.
pub trait InstallBackend: Send + Sync {
    fn ensure(&self, deadline: Option<Instant>) -> BoxFuture<'_, Result<PathBuf, InstallError>>;
}

impl InstallBackend for Installer {
    fn ensure(&self, deadline: Option<Instant>) -> BoxFuture<'_, Result<PathBuf, InstallError>> {
        Box::pin(Installer::ensure(self, deadline))
    }
}

/// Runs the test process.
///
/// The returned future is `'static` so the supervisor can spawn it and race
/// it against the run deadline. Implementations must stop (and kill any
/// child) when `cancel` fires.
pub trait ExecutorBackend: Send + Sync {
    fn run(
        &self,
        sink: Option<SharedSink>,
        cancel: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<RunExit, ProcessError>>;

    /// Working directory of the run, for failure reports.
    fn dir(&self) -> Option<PathBuf> {
        None
    }
}

/// Executor backend that spawns a real child process.
///
/// With `shim` enabled, the `go_js_wasm_exec` link is checked right before
/// the process starts, after installation has had its chance to run.
#[derive(Debug, Clone)]
pub struct RealExecutorBackend {
    spec: ProcessSpec,
    shim: bool,
}

impl RealExecutorBackend {
    pub fn new(spec: ProcessSpec) -> Self {
        Self { spec, shim: false }
    }

    pub fn with_shim(mut self, enabled: bool) -> Self {
        self.shim = enabled;
        self
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn run(
        &self,
        sink: Option<SharedSink>,
        cancel: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<RunExit, ProcessError>> {
        // Clone the spec so the future doesn't borrow `self`.
        let spec = self.spec.clone();
        let shim = self.shim;

        Box::pin(async move {
            if let (true, Some(sink)) = (shim, &sink) {
                match resolve_go_bin_dir().await {
                    Some(bin_dir) => {
                        let status = ensure_exec_shim(&bin_dir, sink.as_ref());
                        debug!(?status, bin_dir = %bin_dir.display(), "exec shim checked");
                    }
                    None => debug!("GOPATH unknown; skipping exec shim"),
                }
            }
            run_process(&spec, sink, cancel).await
        })
    }

    fn dir(&self) -> Option<PathBuf> {
        self.spec.dir.clone()
    }
}
