// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`reader`] turns one child stream into tagged line messages.
//! - [`runner`] spawns the test process with its environment, wires both
//!   readers and reports the exit status.
//! - [`shim`] makes sure `go test` can find the wasm executor.
//! - [`backend`] provides the `InstallBackend` / `ExecutorBackend` traits the
//!   supervisor depends on, and the real executor implementation that tests
//!   can replace with a fake.

pub mod backend;
pub mod reader;
pub mod runner;
pub mod shim;

pub use backend::{BoxFuture, ExecutorBackend, InstallBackend, RealExecutorBackend};
pub use reader::{read_tagged, spawn_reader};
pub use runner::{ProcessSpec, RunExit, child_environment, lookup_env, run_process};
pub use shim::{ShimStatus, ensure_exec_shim, resolve_go_bin_dir};
