use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::oneshot;
use wasmtest::errors::ProcessError;
use wasmtest::exec::{BoxFuture, ExecutorBackend, RunExit};
use wasmtest::message::{ExitStatus, Message, SharedSink};

/// An executor that replays a fixed message script instead of spawning a
/// process.
///
/// - records how many times it was started
/// - with `hang()`, waits for cancellation after the script instead of
///   finishing, and records that it was cancelled.
pub struct FakeExecutor {
    script: Vec<Message>,
    hang: bool,
    dir: Option<PathBuf>,
    runs: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl FakeExecutor {
    pub fn new(script: Vec<Message>) -> Self {
        Self {
            script,
            hang: false,
            dir: Some(PathBuf::from("wasm_test")),
            runs: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Never exit on its own; only cancellation stops the run.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn run(
        &self,
        sink: Option<SharedSink>,
        cancel: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<RunExit, ProcessError>> {
        let script = self.script.clone();
        let hang = self.hang;
        let runs = Arc::clone(&self.runs);
        let cancelled = Arc::clone(&self.cancelled);

        Box::pin(async move {
            let Some(sink) = sink else {
                return Ok(RunExit::NotStarted);
            };
            runs.fetch_add(1, Ordering::SeqCst);

            let mut exit = ExitStatus::Ok;
            for msg in script {
                if let Message::Exit(status) = &msg {
                    exit = status.clone();
                }
                sink.emit(msg);
            }

            if hang {
                // A dropped sender also counts as cancellation.
                let _ = cancel.await;
                cancelled.store(true, Ordering::SeqCst);
                return Ok(RunExit::Cancelled);
            }

            Ok(RunExit::Exited(exit))
        })
    }

    fn dir(&self) -> Option<PathBuf> {
        self.dir.clone()
    }
}
