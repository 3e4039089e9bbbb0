// src/message.rs

//! Tagged progress messages and the sinks that receive them.
//!
//! Every observable step of a run is reported as a [`Message`]. Messages are
//! handed to a [`ProgressSink`] as soon as they are produced; the stdout and
//! stderr readers call the same sink from different Tokio tasks, so sinks
//! must be `Send + Sync` and serialize internally when needed.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::types::{DiagnosticLevel, Stream};

/// How the child process terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    /// Non-zero exit or wait failure. `None` when no detail was available.
    Error(Option<String>),
}

/// A single progress message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// One line of child output, trailing newline stripped.
    Output { stream: Stream, line: String },
    /// A note from wasmtest itself.
    Diagnostic { level: DiagnosticLevel, text: String },
    /// Terminal signal for a completed child process.
    Exit(ExitStatus),
}

impl Message {
    pub fn out(line: impl Into<String>) -> Self {
        Message::Output {
            stream: Stream::Stdout,
            line: line.into(),
        }
    }

    pub fn err(line: impl Into<String>) -> Self {
        Message::Output {
            stream: Stream::Stderr,
            line: line.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Message::Diagnostic {
            level: DiagnosticLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Message::Diagnostic {
            level: DiagnosticLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Message::Diagnostic {
            level: DiagnosticLevel::Error,
            text: text.into(),
        }
    }

    pub fn exit_ok() -> Self {
        Message::Exit(ExitStatus::Ok)
    }

    pub fn exit_error(detail: impl Into<String>) -> Self {
        Message::Exit(ExitStatus::Error(Some(detail.into())))
    }

    /// The wire tag: `out`, `err`, `info`, `warning`, `error` or `exit`.
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Output { stream, .. } => stream.tag(),
            Message::Diagnostic { level, .. } => level.tag(),
            Message::Exit(_) => "exit",
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Message::Exit(_))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Output { stream, line } => write!(f, "[{stream}] {line}"),
            Message::Diagnostic { level, text } => write!(f, "[{level}] {text}"),
            Message::Exit(ExitStatus::Ok) => f.write_str("[exit] ok"),
            Message::Exit(ExitStatus::Error(Some(detail))) => write!(f, "[exit] error: {detail}"),
            Message::Exit(ExitStatus::Error(None)) => f.write_str("[exit] error"),
        }
    }
}

/// Receiver of progress messages.
///
/// Implemented for any `Fn(Message) + Send + Sync`, so plain closures work.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, message: Message);
}

impl<F> ProgressSink for F
where
    F: Fn(Message) + Send + Sync,
{
    fn emit(&self, message: Message) {
        self(message)
    }
}

/// Shared handle to a sink, cloned into every reader task.
pub type SharedSink = Arc<dyn ProgressSink>;

/// Sink that records every message in arrival order.
///
/// The supervisor wraps the caller's sink in a `MessageLog` so that the
/// classifier sees exactly what the caller saw.
#[derive(Default)]
pub struct MessageLog {
    messages: Mutex<Vec<Message>>,
    forward: Option<SharedSink>,
}

impl fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageLog")
            .field("len", &self.len())
            .field("forwarding", &self.forward.is_some())
            .finish()
    }
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record messages and pass each one on to `forward`.
    pub fn forwarding_to(forward: SharedSink) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            forward: Some(forward),
        }
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<Message> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        // A panicking sink must not poison every later reader.
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressSink for MessageLog {
    fn emit(&self, message: Message) {
        {
            let mut guard = self.lock();
            guard.push(message.clone());
        }
        if let Some(forward) = &self.forward {
            forward.emit(message);
        }
    }
}
