// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod handler;
pub mod install;
pub mod logging;
pub mod message;
pub mod scan;
pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default};
use crate::engine::RunReport;
use crate::errors::{Result, WasmtestError};
use crate::fs::RealFileSystem;
use crate::message::{Message, SharedSink};
use crate::types::Stream;

pub use crate::handler::Wasmtest;

/// High-level entry point used by `main.rs`.
///
/// Loads config, applies CLI overrides, checks the test directory and runs
/// the suite. Returns the process exit code for the verdict.
pub async fn run(args: CliArgs) -> Result<i32> {
    let mut cfg = load_or_default(args.config.as_deref())?;
    apply_cli_overrides(&mut cfg, &args);

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(0);
    }

    let report = run_with_config(cfg, console_sink()).await?;
    if !report.is_success() {
        eprintln!("{report}");
    }
    Ok(report.exit_code())
}

/// Simplified API: run the wasm tests in `dir` with an overall `timeout`.
///
/// `dir` of `""` or `"."` means `wasm_test`. Every message is passed to
/// `sink` while the run is in progress. Anything but a passing suite is an
/// error; `WasmtestError::RunFailed` carries the full report.
pub async fn run_tests(dir: &str, timeout: Duration, sink: SharedSink) -> Result<RunReport> {
    let mut cfg = ConfigFile::default();
    cfg.set_dir(dir);
    cfg.run_timeout = timeout;
    cfg.install.timeout = cfg.install.timeout.min(timeout);

    let report = run_with_config(cfg, sink).await?;
    if report.is_success() {
        Ok(report)
    } else {
        Err(WasmtestError::RunFailed(Box::new(report)))
    }
}

/// Check the directory precondition, then install and run.
pub async fn run_with_config(cfg: ConfigFile, sink: SharedSink) -> Result<RunReport> {
    let dir = cfg.dir();
    ensure_has_tests(&dir)?;

    info!(dir = %dir.display(), timeout = ?cfg.run_timeout, "running wasm tests");

    let (mut handler, _install) = Wasmtest::new(cfg);
    match handler.execute(Some(sink)).await {
        Some(report) => Ok(report),
        None => Err(WasmtestError::Other(anyhow::anyhow!(
            "handler returned no report despite a sink"
        ))),
    }
}

fn ensure_has_tests(dir: &Path) -> Result<()> {
    if scan::has_wasm_tests(&RealFileSystem, dir)? {
        Ok(())
    } else {
        warn!(dir = %dir.display(), "no wasm test files found");
        Err(WasmtestError::NoTests(dir.to_path_buf()))
    }
}

fn apply_cli_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(dir) = &args.dir {
        cfg.set_dir(dir);
    }
    if let Some(timeout) = args.timeout {
        cfg.run_timeout = timeout;
    }
    if let Some(timeout) = args.install_timeout {
        cfg.install.timeout = timeout;
    }
    if cfg.install.timeout > cfg.run_timeout {
        debug!(
            install = ?cfg.install.timeout,
            run = ?cfg.run_timeout,
            "install timeout exceeds run timeout; clamping"
        );
        cfg.install.timeout = cfg.run_timeout;
    }
    if args.no_shim {
        cfg.shim = false;
    }
}

/// Test output on stdout/stderr as-is; wasmtest's own notes on stderr.
fn console_sink() -> SharedSink {
    Arc::new(|msg: Message| match msg {
        Message::Output {
            stream: Stream::Stdout,
            line,
        } => println!("{line}"),
        Message::Output {
            stream: Stream::Stderr,
            line,
        } => eprintln!("{line}"),
        other => eprintln!("{other}"),
    })
}

/// Print the effective configuration and the test files that would run.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let dir = cfg.dir();
    println!("wasmtest dry-run");
    println!("  dir: {}", dir.display());
    println!("  command: {}", cfg.process.command_line());
    for (k, v) in &cfg.process.env {
        println!("  env: {k}={v}");
    }
    println!("  timeout: {:?}", cfg.run_timeout);
    println!("  install candidates: {:?}", cfg.install.candidates);
    println!("  install command: {}", cfg.install.command_line());
    println!("  install timeout: {:?}", cfg.install.timeout);
    println!("  exec shim: {}", cfg.shim);
    println!();

    let files = scan::wasm_test_files(&RealFileSystem, &dir)?;
    println!("wasm test files ({}):", files.len());
    for file in files {
        println!("  - {}", file.display());
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
