// src/handler.rs

//! `Wasmtest`: the handler a UI or the CLI drives.

use std::sync::Arc;

use tracing::debug;

use crate::config::ConfigFile;
use crate::engine::{RunPhase, RunReport, Supervisor};
use crate::exec::{ExecutorBackend, InstallBackend, RealExecutorBackend};
use crate::install::{InstallHandle, Installer};
use crate::message::SharedSink;

/// One test directory, one installer, one run at a time.
#[derive(Debug)]
pub struct Wasmtest {
    config: ConfigFile,
    supervisor: Supervisor,
}

impl Wasmtest {
    /// Build a handler and start installing the test executor in the
    /// background.
    ///
    /// Must be called inside a Tokio runtime. The returned handle can be
    /// polled or awaited; runs also wait for the same installation, so
    /// ignoring it is fine.
    pub fn new(config: ConfigFile) -> (Self, InstallHandle) {
        let installer = Arc::new(Installer::new(config.install.clone()));
        let handle = InstallHandle::spawn(Arc::clone(&installer));

        let executor = RealExecutorBackend::new(config.process.clone()).with_shim(config.shim);
        let handler = Self::with_backends(config, installer, Arc::new(executor));
        (handler, handle)
    }

    /// Build a handler around custom backends. Nothing starts until
    /// [`execute`](Self::execute).
    pub fn with_backends(
        config: ConfigFile,
        installer: Arc<dyn InstallBackend>,
        executor: Arc<dyn ExecutorBackend>,
    ) -> Self {
        let supervisor = Supervisor::new(installer, executor, config.run_timeout);
        Self { config, supervisor }
    }

    pub fn name(&self) -> &'static str {
        "WasmTest"
    }

    pub fn label(&self) -> &'static str {
        "Ensure Wasm Browser Test"
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn phase(&self) -> RunPhase {
        self.supervisor.phase()
    }

    /// Run the tests, streaming every message into `sink`.
    ///
    /// Without a sink nobody is listening, so nothing is started and `None`
    /// is returned.
    pub async fn execute(&mut self, sink: Option<SharedSink>) -> Option<RunReport> {
        let Some(sink) = sink else {
            debug!("execute called without a progress sink; nothing to do");
            return None;
        };
        Some(self.supervisor.supervise(sink).await)
    }

    pub fn last_operation_id(&self) -> Option<&str> {
        self.supervisor.last_operation_id()
    }

    pub fn set_last_operation_id(&mut self, id: impl Into<String>) {
        self.supervisor.set_last_operation_id(id);
    }
}
