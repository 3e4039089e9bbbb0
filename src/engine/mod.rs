// src/engine/mod.rs

//! Run supervision and verdicts.
//!
//! - [`supervisor`] drives one run: install, spawn, race the deadline.
//! - [`classify`] turns the recorded messages into a [`RunOutcome`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::message::Message;

pub mod classify;
pub mod supervisor;

pub use classify::{classify, extract_failing_units, parse_failing_unit};
pub use supervisor::Supervisor;

/// Final verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// The child ran and the suite failed or reported an error.
    Failure,
    /// Clean exit without evidence that any test passed.
    Indeterminate,
    TimedOut,
    /// No usable output, or the executor could not be installed or started.
    EnvironmentError,
}

impl RunStatus {
    /// Process exit code for this verdict. Only `Success` maps to 0.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
            RunStatus::Indeterminate => 2,
            RunStatus::EnvironmentError => 3,
            RunStatus::TimedOut => 124,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Indeterminate => "indeterminate",
            RunStatus::TimedOut => "timed out",
            RunStatus::EnvironmentError => "environment error",
        };
        f.write_str(s)
    }
}

/// Verdict plus the failing tests found in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Distinct failing test names in first-seen order.
    pub failing_units: Vec<String>,
    pub detail: String,
}

impl RunOutcome {
    pub fn success() -> Self {
        Self {
            status: RunStatus::Success,
            failing_units: Vec::new(),
            detail: String::new(),
        }
    }

    pub fn failure(detail: impl Into<String>, failing_units: Vec<String>) -> Self {
        Self {
            status: RunStatus::Failure,
            failing_units,
            detail: detail.into(),
        }
    }

    pub fn indeterminate(detail: impl Into<String>, failing_units: Vec<String>) -> Self {
        Self {
            status: RunStatus::Indeterminate,
            failing_units,
            detail: detail.into(),
        }
    }

    pub fn timed_out(timeout: Duration, failing_units: Vec<String>) -> Self {
        Self {
            status: RunStatus::TimedOut,
            failing_units,
            detail: format!("test execution timed out after {timeout:?}"),
        }
    }

    pub fn environment_error(detail: impl Into<String>) -> Self {
        Self {
            status: RunStatus::EnvironmentError,
            failing_units: Vec::new(),
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Supervisor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Installing,
    Running,
    Completed,
    TimedOut,
}

/// Outcome of a supervised run with the context needed to diagnose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub operation_id: String,
    pub dir: Option<PathBuf>,
    pub timeout: Duration,
    pub message_count: usize,
    pub last_message: Option<Message>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.status.exit_code()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wasm tests {}", self.outcome.status)?;
        if !self.outcome.detail.is_empty() {
            write!(f, ": {}", self.outcome.detail)?;
        }
        writeln!(f)?;
        match &self.dir {
            Some(dir) => writeln!(f, "  dir: {}", dir.display())?,
            None => writeln!(f, "  dir: (current directory)")?,
        }
        writeln!(f, "  operation: {}", self.operation_id)?;
        writeln!(f, "  timeout: {:?}", self.timeout)?;
        writeln!(f, "  messages: {}", self.message_count)?;
        match &self.last_message {
            Some(msg) => writeln!(f, "  last message: {msg}")?,
            None => writeln!(f, "  last message: (none)")?,
        }
        if self.outcome.failing_units.is_empty() {
            write!(f, "  failing tests: (none)")
        } else {
            write!(f, "  failing tests: {}", self.outcome.failing_units.join(", "))
        }
    }
}
