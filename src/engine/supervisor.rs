// src/engine/supervisor.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::engine::classify::{classify, extract_failing_units};
use crate::engine::{RunOutcome, RunPhase, RunReport};
use crate::errors::ProcessError;
use crate::exec::{ExecutorBackend, InstallBackend, RunExit};
use crate::message::{Message, MessageLog, SharedSink};

/// How long a cancelled runner gets to kill and reap its child.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Drives one run at a time: `Idle → Installing → Running → Completed |
/// TimedOut`.
///
/// Every message goes to the caller's sink as it happens and is also
/// recorded, so the verdict is computed from exactly what the caller saw.
/// Runs take `&mut self`, so a supervisor never has two active runs.
pub struct Supervisor {
    installer: Arc<dyn InstallBackend>,
    executor: Arc<dyn ExecutorBackend>,
    timeout: Duration,
    phase: RunPhase,
    runs: u64,
    last_operation_id: Option<String>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("timeout", &self.timeout)
            .field("phase", &self.phase)
            .field("runs", &self.runs)
            .field("last_operation_id", &self.last_operation_id)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        installer: Arc<dyn InstallBackend>,
        executor: Arc<dyn ExecutorBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            installer,
            executor,
            timeout,
            phase: RunPhase::Idle,
            runs: 0,
            last_operation_id: None,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn last_operation_id(&self) -> Option<&str> {
        self.last_operation_id.as_deref()
    }

    pub fn set_last_operation_id(&mut self, id: impl Into<String>) {
        self.last_operation_id = Some(id.into());
    }

    /// Install, run and classify, all bounded by the run timeout.
    pub async fn supervise(&mut self, sink: SharedSink) -> RunReport {
        self.runs += 1;
        let operation_id = format!("run-{}", self.runs);
        self.last_operation_id = Some(operation_id.clone());

        let deadline = Instant::now() + self.timeout;
        let log = Arc::new(MessageLog::forwarding_to(sink));

        info!(operation = %operation_id, timeout = ?self.timeout, "supervised run starting");

        let outcome = self.drive(deadline, &log).await;

        info!(
            operation = %operation_id,
            status = %outcome.status,
            failing = ?outcome.failing_units,
            messages = log.len(),
            "supervised run finished"
        );

        RunReport {
            outcome,
            operation_id,
            dir: self.executor.dir(),
            timeout: self.timeout,
            message_count: log.len(),
            last_message: log.last(),
        }
    }

    async fn drive(&mut self, deadline: Instant, log: &Arc<MessageLog>) -> RunOutcome {
        let sink: SharedSink = log.clone();

        let installer = Arc::clone(&self.installer);

        self.transition(RunPhase::Installing);
        match tokio::time::timeout_at(deadline, installer.ensure(Some(deadline))).await {
            Ok(Ok(path)) => debug!(path = %path.display(), "test executor ready"),
            Ok(Err(err)) => {
                error!(error = %err, "test executor unavailable; not starting run");
                sink.emit(Message::error(format!("failed to setup WASM executor: {err}")));
                self.transition(RunPhase::Completed);
                return RunOutcome::environment_error(err.to_string());
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "run deadline elapsed during installation");
                self.transition(RunPhase::TimedOut);
                return RunOutcome::timed_out(self.timeout, Vec::new());
            }
        }

        self.transition(RunPhase::Running);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let mut handle = tokio::spawn(self.executor.run(Some(sink.clone()), cancel_rx));

        tokio::select! {
            joined = &mut handle => {
                self.transition(RunPhase::Completed);
                let result = joined.map_err(|e| ProcessError::Join(e.to_string()));
                match result.and_then(|r| r) {
                    Ok(RunExit::Exited(_)) => classify(&log.snapshot()),
                    // The sink is always passed and cancellation only comes
                    // from the deadline branch, so only a custom backend
                    // stops here without exiting.
                    Ok(exit) => {
                        warn!(?exit, "executor backend stopped without running the tests");
                        RunOutcome::environment_error(format!(
                            "test process did not run to completion ({exit:?})"
                        ))
                    }
                    Err(err) => {
                        error!(error = %err, "test process could not be run");
                        sink.emit(Message::error(err.to_string()));
                        RunOutcome::environment_error(err.to_string())
                    }
                }
            }

            _ = tokio::time::sleep_until(deadline) => {
                warn!(timeout = ?self.timeout, "run deadline elapsed; terminating test process");
                let _ = cancel_tx.send(());

                // Wait for the runner to kill and reap the child.
                if tokio::time::timeout(KILL_GRACE, &mut handle).await.is_err() {
                    warn!(grace = ?KILL_GRACE, "runner did not stop after cancellation; aborting it");
                    handle.abort();
                }

                self.transition(RunPhase::TimedOut);
                RunOutcome::timed_out(self.timeout, extract_failing_units(&log.snapshot()))
            }
        }
    }

    fn transition(&mut self, next: RunPhase) {
        debug!(from = ?self.phase, to = ?next, "supervisor phase");
        self.phase = next;
    }
}
