// tests/supervisor_fake_backends.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use wasmtest::Wasmtest;
use wasmtest::engine::{RunPhase, RunStatus, Supervisor};
use wasmtest::errors::{InstallError, ProcessError};
use wasmtest::exec::{BoxFuture, ExecutorBackend, RunExit};
use wasmtest::message::{Message, MessageLog, SharedSink};
use wasmtest_test_utils::builders::{ConfigFileBuilder, failing_run, passing_run};
use wasmtest_test_utils::fake_executor::FakeExecutor;
use wasmtest_test_utils::fake_installer::FakeInstaller;
use wasmtest_test_utils::{init_tracing, with_timeout};

fn supervisor(
    installer: &Arc<FakeInstaller>,
    executor: &Arc<FakeExecutor>,
    timeout: Duration,
) -> Supervisor {
    Supervisor::new(installer.clone(), executor.clone(), timeout)
}

#[tokio::test]
async fn passing_run_is_success_and_forwards_every_message() {
    init_tracing();
    let installer = Arc::new(FakeInstaller::ready());
    let executor = Arc::new(FakeExecutor::new(passing_run()));
    let mut sup = supervisor(&installer, &executor, Duration::from_secs(5));

    let seen = Arc::new(MessageLog::new());
    let report = with_timeout(sup.supervise(seen.clone())).await;

    assert_eq!(report.outcome.status, RunStatus::Success);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(seen.snapshot(), passing_run());
    assert_eq!(report.message_count, passing_run().len());
    assert_eq!(report.last_message, Some(Message::exit_ok()));
    assert_eq!(report.dir, Some(PathBuf::from("wasm_test")));
    assert_eq!(sup.phase(), RunPhase::Completed);
    assert_eq!(installer.calls(), 1);
    assert_eq!(executor.runs(), 1);
}

#[tokio::test]
async fn failing_run_reports_failing_units() {
    init_tracing();
    let installer = Arc::new(FakeInstaller::ready());
    let executor = Arc::new(FakeExecutor::new(failing_run("TestParse")));
    let mut sup = supervisor(&installer, &executor, Duration::from_secs(5));

    let report = with_timeout(sup.supervise(Arc::new(MessageLog::new()))).await;

    assert_eq!(report.outcome.status, RunStatus::Failure);
    assert_eq!(report.outcome.failing_units, vec!["TestParse"]);
    assert!(report.to_string().contains("failing tests: TestParse"));
}

#[tokio::test]
async fn install_failure_never_starts_the_run() {
    init_tracing();
    let installer = Arc::new(FakeInstaller::failing(InstallError::NotFoundAfterInstall {
        candidates: vec!["toolA".into(), "toolB".into()],
    }));
    let executor = Arc::new(FakeExecutor::new(passing_run()));
    let mut sup = supervisor(&installer, &executor, Duration::from_secs(5));

    let seen = Arc::new(MessageLog::new());
    let report = with_timeout(sup.supervise(seen.clone())).await;

    assert_eq!(report.outcome.status, RunStatus::EnvironmentError);
    assert_eq!(executor.runs(), 0);

    let messages = seen.snapshot();
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        Message::Diagnostic { text, .. } => {
            assert!(text.starts_with("failed to setup WASM executor"), "{text}");
            assert!(text.contains("toolA"));
        }
        other => panic!("expected an error diagnostic, got {other:?}"),
    }
}

#[tokio::test]
async fn hanging_process_times_out_and_is_cancelled() {
    init_tracing();
    let installer = Arc::new(FakeInstaller::ready());
    let executor = Arc::new(
        FakeExecutor::new(vec![
            Message::out("=== RUN   TestSlow"),
            Message::out("--- FAIL: TestEarly (0.00s)"),
        ])
        .hang(),
    );
    let timeout = Duration::from_millis(200);
    let mut sup = supervisor(&installer, &executor, timeout);

    let report = with_timeout(sup.supervise(Arc::new(MessageLog::new()))).await;

    assert_eq!(report.outcome.status, RunStatus::TimedOut);
    assert_eq!(report.exit_code(), 124);
    assert!(report.outcome.detail.contains("timed out after"));
    assert_eq!(report.outcome.failing_units, vec!["TestEarly"]);
    assert_eq!(sup.phase(), RunPhase::TimedOut);
    assert!(executor.was_cancelled());
}

#[tokio::test]
async fn slow_install_counts_against_the_run_deadline() {
    init_tracing();
    let installer = Arc::new(FakeInstaller::ready().slow(Duration::from_secs(30)));
    let executor = Arc::new(FakeExecutor::new(passing_run()));
    let mut sup = supervisor(&installer, &executor, Duration::from_millis(150));

    let report = with_timeout(sup.supervise(Arc::new(MessageLog::new()))).await;

    assert_eq!(report.outcome.status, RunStatus::TimedOut);
    assert_eq!(executor.runs(), 0);
}

#[tokio::test]
async fn each_run_gets_a_new_operation_id() {
    let installer = Arc::new(FakeInstaller::ready());
    let executor = Arc::new(FakeExecutor::new(passing_run()));
    let mut sup = supervisor(&installer, &executor, Duration::from_secs(5));
    assert_eq!(sup.phase(), RunPhase::Idle);
    assert_eq!(sup.last_operation_id(), None);

    let first = sup.supervise(Arc::new(MessageLog::new())).await;
    let second = sup.supervise(Arc::new(MessageLog::new())).await;

    assert_eq!(first.operation_id, "run-1");
    assert_eq!(second.operation_id, "run-2");
    assert_eq!(sup.last_operation_id(), Some("run-2"));
    assert_eq!(executor.runs(), 2);
}

#[tokio::test]
async fn handler_without_sink_does_nothing() {
    let installer = Arc::new(FakeInstaller::ready());
    let executor = Arc::new(FakeExecutor::new(passing_run()));
    let config = ConfigFileBuilder::new().with_timeout("5s").build();
    let mut handler = Wasmtest::with_backends(config, installer.clone(), executor.clone());

    assert!(handler.execute(None).await.is_none());
    assert_eq!(installer.calls(), 0);
    assert_eq!(executor.runs(), 0);
    assert_eq!(handler.phase(), RunPhase::Idle);
}

#[tokio::test]
async fn handler_streams_to_a_closure_sink() {
    let installer = Arc::new(FakeInstaller::ready());
    let executor = Arc::new(FakeExecutor::new(passing_run()));
    let config = ConfigFileBuilder::new().with_timeout("5s").build();
    let mut handler = Wasmtest::with_backends(config, installer, executor);

    let lines = Arc::new(std::sync::Mutex::new(Vec::new()));
    let collected = Arc::clone(&lines);
    let sink: SharedSink = Arc::new(move |msg: Message| {
        collected.lock().unwrap().push(msg.to_string());
    });

    let report = handler.execute(Some(sink)).await.expect("sink given");

    assert!(report.is_success());
    assert_eq!(handler.name(), "WasmTest");
    assert_eq!(handler.label(), "Ensure Wasm Browser Test");
    assert_eq!(handler.last_operation_id(), Some("run-1"));
    assert_eq!(lines.lock().unwrap().len(), passing_run().len());

    handler.set_last_operation_id("op-42");
    assert_eq!(handler.last_operation_id(), Some("op-42"));
}

/// A backend that gives up on its own without running anything.
struct GivesUp(RunExit);

impl ExecutorBackend for GivesUp {
    fn run(
        &self,
        _sink: Option<SharedSink>,
        _cancel: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<RunExit, ProcessError>> {
        let exit = self.0.clone();
        Box::pin(async move { Ok(exit) })
    }
}

#[tokio::test]
async fn backend_that_stops_without_exiting_is_an_environment_error() {
    for exit in [RunExit::NotStarted, RunExit::Cancelled] {
        let installer = Arc::new(FakeInstaller::ready());
        let mut sup = Supervisor::new(
            installer,
            Arc::new(GivesUp(exit.clone())),
            Duration::from_secs(5),
        );

        let report = with_timeout(sup.supervise(Arc::new(MessageLog::new()))).await;

        assert_eq!(report.outcome.status, RunStatus::EnvironmentError, "{exit:?}");
        assert!(report.outcome.detail.contains("did not run to completion"));
        assert_eq!(sup.phase(), RunPhase::Completed);
    }
}
