// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::parse_duration;

/// Command-line arguments for `wasmtest`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wasmtest",
    version,
    about = "Run Go WebAssembly tests in a headless browser and report a verdict.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory containing the wasm tests.
    ///
    /// Empty or "." selects `wasm_test`. Overrides `[run].dir`.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<String>,

    /// Path to a config file (TOML).
    ///
    /// Default: `wasmtest.toml` in the current directory if it exists,
    /// built-in defaults otherwise.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Overall deadline for the run, e.g. "90s" or "10m".
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Deadline for installing the test executor, e.g. "2m".
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub install_timeout: Option<Duration>,

    /// Do not create the `go_js_wasm_exec` symlink.
    #[arg(long)]
    pub no_shim: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WASMTEST_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load config and check the test directory, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations_and_flags() {
        let args = CliArgs::try_parse_from([
            "wasmtest",
            "--dir",
            "example",
            "--timeout",
            "90s",
            "--install-timeout",
            "250ms",
            "--no-shim",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.dir.as_deref(), Some("example"));
        assert_eq!(args.timeout, Some(Duration::from_secs(90)));
        assert_eq!(args.install_timeout, Some(Duration::from_millis(250)));
        assert!(args.no_shim);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }

    #[test]
    fn rejects_bad_duration() {
        assert!(CliArgs::try_parse_from(["wasmtest", "--timeout", "forever"]).is_err());
    }
}
