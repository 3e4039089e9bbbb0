// tests/run_tests_api.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use wasmtest::engine::RunStatus;
use wasmtest::errors::WasmtestError;
use wasmtest::message::MessageLog;
use wasmtest::{run_tests, run_with_config};
use wasmtest_test_utils::builders::ConfigFileBuilder;
use wasmtest_test_utils::{init_tracing, with_timeout};

const WASM_TEST: &str = "//go:build js && wasm\n\npackage wasm_test\n";

fn dir_with_wasm_test() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("dom_test.go"), WASM_TEST).unwrap();
    dir
}

fn path_str(dir: &Path) -> &str {
    dir.to_str().expect("temp dir path is utf-8")
}

#[tokio::test]
async fn directory_without_wasm_tests_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("plain_test.go"), "package plain\n").unwrap();

    let sink = Arc::new(MessageLog::new());
    let err = run_tests(path_str(dir.path()), Duration::from_secs(5), sink.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, WasmtestError::NoTests(_)), "{err:?}");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone");

    let result = run_tests(path_str(&missing), Duration::from_secs(5), Arc::new(MessageLog::new())).await;

    assert!(result.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn end_to_end_with_a_stand_in_test_command() {
    init_tracing();
    let dir = dir_with_wasm_test();
    let cfg = ConfigFileBuilder::new()
        .with_dir(path_str(dir.path()))
        .with_command("sh", &["-c", "echo \"=== RUN TestDom ($GOOS/$GOARCH)\"; echo PASS"])
        .with_install(&["sh"], &["false"], "5s")
        .with_timeout("10s")
        .with_shim(false)
        .build();

    let log = Arc::new(MessageLog::new());
    let report = with_timeout(run_with_config(cfg, log.clone())).await.unwrap();

    assert_eq!(report.outcome.status, RunStatus::Success, "{report}");
    assert!(
        log.snapshot()
            .iter()
            .any(|m| m.to_string() == "[out] === RUN TestDom (js/wasm)")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn end_to_end_failure_lists_failing_tests() {
    init_tracing();
    let dir = dir_with_wasm_test();
    let cfg = ConfigFileBuilder::new()
        .with_dir(path_str(dir.path()))
        .with_command(
            "sh",
            &["-c", "echo '--- FAIL: TestDom (0.01s)'; echo FAIL; exit 1"],
        )
        .with_install(&["sh"], &["false"], "5s")
        .with_timeout("10s")
        .with_shim(false)
        .build();

    let report = with_timeout(run_with_config(cfg, Arc::new(MessageLog::new())))
        .await
        .unwrap();

    assert_eq!(report.outcome.status, RunStatus::Failure);
    assert_eq!(report.outcome.failing_units, vec!["TestDom"]);
    assert_eq!(report.exit_code(), 1);
}
