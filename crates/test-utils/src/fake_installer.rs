use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use wasmtest::errors::InstallError;
use wasmtest::exec::{BoxFuture, InstallBackend};

/// An installer that:
/// - counts how often `ensure` was called
/// - optionally sleeps before answering
/// - returns a scripted result.
pub struct FakeInstaller {
    result: Result<PathBuf, InstallError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeInstaller {
    pub fn ready() -> Self {
        Self::with_result(Ok(PathBuf::from("/fake/bin/wasmbrowsertest")))
    }

    pub fn failing(err: InstallError) -> Self {
        Self::with_result(Err(err))
    }

    pub fn with_result(result: Result<PathBuf, InstallError>) -> Self {
        Self {
            result,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` before answering, e.g. to outlast the run deadline.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InstallBackend for FakeInstaller {
    fn ensure(&self, _deadline: Option<Instant>) -> BoxFuture<'_, Result<PathBuf, InstallError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result.clone()
        })
    }
}
