// src/exec/runner.rs

//! Child process runner.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::ProcessError;
use crate::exec::reader::spawn_reader;
use crate::message::{ExitStatus, Message, SharedSink};
use crate::types::Stream;

/// What to run and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Applied on top of the inherited environment; later entries win.
    pub env: Vec<(String, String)>,
    pub dir: Option<PathBuf>,
    /// How long to wait for the stream readers after the child exits.
    pub drain_grace: Duration,
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            args: vec!["test".to_string(), "-v".to_string()],
            env: vec![
                ("GOOS".to_string(), "js".to_string()),
                ("GOARCH".to_string(), "wasm".to_string()),
            ],
            dir: None,
            drain_grace: Duration::from_secs(2),
        }
    }
}

impl ProcessSpec {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a call to [`run_process`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    /// No sink was supplied, so the child was never started.
    NotStarted,
    /// The child finished and its exit message was emitted.
    Exited(ExitStatus),
    /// Cancellation arrived first; the child was killed and no exit message
    /// was emitted.
    Cancelled,
}

/// Inherited environment followed by `overrides`.
///
/// Duplicate names are kept; lookups must take the last match (see
/// [`lookup_env`]), which is also what `Command::envs` does.
pub fn child_environment(overrides: &[(String, String)]) -> Vec<(OsString, OsString)> {
    std::env::vars_os()
        .chain(
            overrides
                .iter()
                .map(|(k, v)| (OsString::from(k), OsString::from(v))),
        )
        .collect()
}

/// Last-match-wins lookup in an environment list.
pub fn lookup_env<'a>(env: &'a [(OsString, OsString)], name: &str) -> Option<&'a OsStr> {
    env.iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_os_str())
}

/// Run the child described by `spec`, streaming its output into `sink`.
///
/// Stdout and stderr are read on two Tokio tasks. Once the child exits the
/// readers get `drain_grace` (shared by both) to finish, then exactly one
/// `Exit` message is emitted. Readers still running after the grace are
/// abandoned and the process group is killed, since only a leftover
/// grandchild can hold the pipes open.
///
/// If `cancel_rx` fires (or its sender is dropped) before the `Exit` message,
/// the child and its process group are killed and no exit message is
/// emitted. This includes cancellation while output is still draining.
pub async fn run_process(
    spec: &ProcessSpec,
    sink: Option<SharedSink>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<RunExit, ProcessError> {
    let Some(sink) = sink else {
        debug!(cmd = %spec.command_line(), "no progress sink; not starting child process");
        return Ok(RunExit::NotStarted);
    };

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .env_clear()
        .envs(child_environment(&spec.env))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.dir {
        cmd.current_dir(dir);
    }

    // Own process group, so a timeout can take down grandchildren too.
    #[cfg(unix)]
    cmd.process_group(0);

    info!(cmd = %spec.command_line(), dir = ?spec.dir, "starting test process");

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    // `Child::id` is gone once the child is reaped, but the group outlives it.
    let group = child.id();

    let stdout = child.stdout.take().ok_or(ProcessError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(ProcessError::MissingPipe("stderr"))?;

    let mut readers = [
        spawn_reader(stdout, Stream::Stdout, sink.clone()),
        spawn_reader(stderr, Stream::Stderr, sink.clone()),
    ];

    let status_res = tokio::select! {
        res = child.wait() => res,

        cancel = &mut cancel_rx => {
            log_cancel(spec, cancel.is_err(), "killing test process");
            kill_group(group);
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill test process");
            }
            abort_readers(&readers);
            return Ok(RunExit::Cancelled);
        }
    };

    let drained = tokio::select! {
        drained = drain_readers(&mut readers, spec.drain_grace) => drained,

        cancel = &mut cancel_rx => {
            log_cancel(spec, cancel.is_err(), "test process exited; killing leftover group members");
            kill_group(group);
            abort_readers(&readers);
            return Ok(RunExit::Cancelled);
        }
    };

    if !drained {
        kill_group(group);
        abort_readers(&readers);
    }

    let status = match status_res {
        Ok(status) if status.success() => ExitStatus::Ok,
        Ok(status) => ExitStatus::Error(Some(describe_exit(status))),
        Err(e) => ExitStatus::Error(Some(format!("waiting for child: {e}"))),
    };

    info!(cmd = %spec.command_line(), ?status, "test process exited");
    sink.emit(Message::Exit(status.clone()));
    Ok(RunExit::Exited(status))
}

/// Wait for both readers under one shared `grace`. False if it ran out.
async fn drain_readers(readers: &mut [JoinHandle<usize>; 2], grace: Duration) -> bool {
    let [out, err] = readers;
    match tokio::time::timeout(grace, async { tokio::join!(out, err) }).await {
        Ok((out, err)) => {
            for joined in [out, err] {
                match joined {
                    Ok(lines) => debug!(lines, "stream reader finished"),
                    Err(e) => debug!(error = %e, "stream reader task ended abnormally"),
                }
            }
            true
        }
        Err(_) => {
            // Something outside our control still holds the pipe open.
            warn!(?grace, "stream readers still running after child exit; abandoning");
            false
        }
    }
}

fn abort_readers(readers: &[JoinHandle<usize>; 2]) {
    for reader in readers {
        reader.abort();
    }
}

fn log_cancel(spec: &ProcessSpec, sender_dropped: bool, action: &str) {
    if sender_dropped {
        debug!("cancel sender dropped; treating as cancellation");
    }
    info!(cmd = %spec.command_line(), "cancellation requested; {action}");
}

/// SIGKILL the process group led by `pid`. No-op off unix.
fn kill_group(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // SAFETY: killpg has no memory-safety preconditions; the group id is
        // the child's pid because it was spawned with process_group(0).
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            // ESRCH: the whole group is already gone.
            debug!(pid, error = %std::io::Error::last_os_error(), "killpg failed");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

/// Render an exit status the way `go test` users expect to read it.
fn describe_exit(status: std::process::ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {code}");
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {signal}");
        }
    }

    status.to_string()
}
