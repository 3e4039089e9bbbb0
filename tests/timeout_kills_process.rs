// tests/timeout_kills_process.rs
#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use wasmtest::engine::{RunStatus, Supervisor};
use wasmtest::exec::{ProcessSpec, RealExecutorBackend, RunExit, run_process};
use wasmtest::message::{ExitStatus, Message, MessageLog};
use wasmtest::types::Stream;
use wasmtest_test_utils::fake_installer::FakeInstaller;
use wasmtest_test_utils::{init_tracing, with_timeout};

fn pid_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence and permission.
    if unsafe { libc::kill(pid, 0) } != 0 {
        return false;
    }
    // A killed orphan can linger as a zombie if init is slow to reap it.
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => !is_zombie(&stat),
        Err(_) => true,
    }
}

fn is_zombie(stat: &str) -> bool {
    // Format: "pid (comm) state ..."; comm may contain spaces.
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .is_some_and(|state| state == "Z")
}

/// Allowed overrun past the run deadline before it counts as late.
const SLACK: Duration = Duration::from_secs(1);

fn sh(script: &str, drain_grace: Duration) -> ProcessSpec {
    ProcessSpec {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        env: Vec::new(),
        dir: None,
        drain_grace,
    }
}

fn printed_pids(log: &MessageLog) -> Vec<i32> {
    log.snapshot()
        .iter()
        .filter_map(|m| match m {
            Message::Output {
                stream: Stream::Stdout,
                line,
            } => line.trim().parse().ok(),
            _ => None,
        })
        .collect()
}

/// Killed orphans are reaped by init, which may take a moment.
async fn wait_until_dead(pids: &[i32]) {
    with_timeout(async {
        while pids.iter().any(|&pid| pid_alive(pid)) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
}

async fn supervise_sh(
    script: &str,
    drain_grace: Duration,
    timeout: Duration,
) -> (RunStatus, Duration, Arc<MessageLog>) {
    let executor = Arc::new(RealExecutorBackend::new(sh(script, drain_grace)));
    let installer = Arc::new(FakeInstaller::ready());
    let mut sup = Supervisor::new(installer, executor, timeout);

    let log = Arc::new(MessageLog::new());
    let started = Instant::now();
    let report = with_timeout(sup.supervise(log.clone())).await;
    (report.outcome.status, started.elapsed(), log)
}

#[tokio::test]
async fn deadline_kills_the_whole_process_group() {
    init_tracing();
    let timeout = Duration::from_millis(500);

    // The shell prints its pid, starts a background grandchild, then
    // replaces itself with a long sleep.
    let (status, elapsed, log) = supervise_sh(
        "sleep 30 & echo $!; echo $$; exec sleep 30",
        Duration::from_millis(200),
        timeout,
    )
    .await;

    assert_eq!(status, RunStatus::TimedOut);
    assert!(elapsed < timeout + SLACK, "timed out late: {elapsed:?}");

    let pids = printed_pids(&log);
    assert_eq!(pids.len(), 2, "expected grandchild and child pids");
    wait_until_dead(&pids).await;
}

#[tokio::test]
async fn deadline_during_output_drain_is_not_delayed() {
    init_tracing();
    let timeout = Duration::from_millis(500);

    // The shell exits at once, but the grandchild keeps both pipes open, so
    // the runner is still draining when the deadline fires.
    let (status, elapsed, log) =
        supervise_sh("sleep 30 & echo $!", Duration::from_secs(5), timeout).await;

    assert_eq!(status, RunStatus::TimedOut);
    assert!(elapsed < timeout + SLACK, "timed out late: {elapsed:?}");
    assert!(log.snapshot().iter().all(|m| !m.is_exit()), "no exit after cancellation");

    let pids = printed_pids(&log);
    assert_eq!(pids.len(), 1, "expected the grandchild pid");
    wait_until_dead(&pids).await;
}

#[tokio::test]
async fn abandoned_drain_shares_one_grace_and_kills_leftovers() {
    init_tracing();
    let grace = Duration::from_secs(1);
    let spec = sh("sleep 30 & echo $!", grace);
    let log = Arc::new(MessageLog::new());
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let started = Instant::now();
    let exit = with_timeout(run_process(&spec, Some(log.clone()), cancel_rx))
        .await
        .expect("process runs");
    let elapsed = started.elapsed();

    assert_eq!(exit, RunExit::Exited(ExitStatus::Ok));
    // Both readers wait on the same pipes; one grace covers them together.
    assert!(elapsed >= grace, "drained too early: {elapsed:?}");
    assert!(
        elapsed < grace * 2 - Duration::from_millis(200),
        "grace applied per reader: {elapsed:?}"
    );
    assert_eq!(log.last(), Some(Message::exit_ok()));

    let pids = printed_pids(&log);
    assert_eq!(pids.len(), 1, "expected the grandchild pid");
    wait_until_dead(&pids).await;
}
