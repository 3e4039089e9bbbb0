// src/engine/classify.rs

//! Verdict from free-text test output.
//!
//! This is a heuristic over `go test -v` text conventions, not a report
//! protocol. It degrades to `Indeterminate` when the output does not have the
//! expected shape. Precedence, highest first:
//!
//! 1. any `error` diagnostic,
//! 2. the exit status,
//! 3. text markers (`PASS`).

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::engine::RunOutcome;
use crate::message::{ExitStatus, Message};
use crate::types::{DiagnosticLevel, Stream};

/// Substring that must appear on stdout for a clean exit to count as a pass.
pub const PASS_MARKER: &str = "PASS";

/// Prefix of a failing-test line in `go test -v` output.
pub const FAIL_MARKER: &str = "--- FAIL: ";

static FAIL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^--- FAIL: (\S.*?)(?:\s+\(\d+(?:\.\d+)?s\))?\s*$")
        .expect("failing-test pattern is valid")
});

/// Reduce an ordered message sequence to a single outcome.
pub fn classify(messages: &[Message]) -> RunOutcome {
    if messages.is_empty() {
        return RunOutcome::environment_error("no output received from test runner");
    }

    let failing_units = extract_failing_units(messages);

    let errors: Vec<&str> = messages
        .iter()
        .filter_map(|m| match m {
            Message::Diagnostic {
                level: DiagnosticLevel::Error,
                text,
            } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    if !errors.is_empty() {
        debug!(count = errors.len(), "error diagnostics present; run failed");
        return RunOutcome::failure(errors.join("; "), failing_units);
    }

    // The exit message is authoritative even if trailing output arrived
    // after it.
    let exit = messages.iter().rev().find_map(|m| match m {
        Message::Exit(status) => Some(status),
        _ => None,
    });

    match exit {
        Some(ExitStatus::Error(detail)) => RunOutcome::failure(
            detail.clone().unwrap_or_else(|| "unknown error".to_string()),
            failing_units,
        ),
        Some(ExitStatus::Ok) if has_pass_marker(messages) => RunOutcome::success(),
        Some(ExitStatus::Ok) => RunOutcome::indeterminate(
            "tests completed but no PASS found in output",
            failing_units,
        ),
        None => RunOutcome::indeterminate("no exit status received from test runner", failing_units),
    }
}

fn has_pass_marker(messages: &[Message]) -> bool {
    stdout_lines(messages).any(|line| line.contains(PASS_MARKER))
}

/// Names from `--- FAIL: <name> (<duration>)` lines on stdout, in first-seen
/// order, without duplicates.
///
/// Subtest lines are indented by `go test`; leading whitespace is ignored.
pub fn extract_failing_units(messages: &[Message]) -> Vec<String> {
    let mut units: Vec<String> = Vec::new();
    for name in stdout_lines(messages).filter_map(parse_failing_unit) {
        if !units.iter().any(|u| u == name) {
            units.push(name.to_string());
        }
    }
    units
}

/// The test name on a `--- FAIL: ` line, without the trailing duration.
pub fn parse_failing_unit(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if !line.starts_with(FAIL_MARKER) {
        return None;
    }
    FAIL_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn stdout_lines(messages: &[Message]) -> impl Iterator<Item = &str> {
    messages.iter().filter_map(|m| match m {
        Message::Output {
            stream: Stream::Stdout,
            line,
        } => Some(line.as_str()),
        _ => None,
    })
}
