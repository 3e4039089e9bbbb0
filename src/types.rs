use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which child stream an output line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    /// Wire tag used when the message is rendered as a tagged tuple.
    pub fn tag(self) -> &'static str {
        match self {
            Stream::Stdout => "out",
            Stream::Stderr => "err",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Severity of a diagnostic emitted by wasmtest itself (not by the child).
///
/// Only `Error` diagnostics influence the verdict: any of them turns the run
/// into a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl DiagnosticLevel {
    pub fn tag(self) -> &'static str {
        match self {
            DiagnosticLevel::Info => "info",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
        }
    }
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DiagnosticLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(DiagnosticLevel::Info),
            "warning" | "warn" => Ok(DiagnosticLevel::Warning),
            "error" => Ok(DiagnosticLevel::Error),
            // "err" is the stderr output tag, never a diagnostic level.
            other => Err(format!(
                "invalid diagnostic level: {other} (expected \"info\", \"warning\" or \"error\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_level_parses_canonical_tags_and_warn_alias() {
        assert_eq!("info".parse::<DiagnosticLevel>(), Ok(DiagnosticLevel::Info));
        assert_eq!("WARN".parse::<DiagnosticLevel>(), Ok(DiagnosticLevel::Warning));
        assert_eq!(" error ".parse::<DiagnosticLevel>(), Ok(DiagnosticLevel::Error));
    }

    #[test]
    fn err_is_not_accepted_as_a_diagnostic_level() {
        assert!("err".parse::<DiagnosticLevel>().is_err());
    }

    #[test]
    fn stream_tags_match_wire_names() {
        assert_eq!(Stream::Stdout.tag(), "out");
        assert_eq!(Stream::Stderr.to_string(), "err");
    }
}
