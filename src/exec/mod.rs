// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs one command at a time with `tokio::process::Command` and
//! turns everything that happens during the run into a [`RunResult`].
//!
//! - [`command`] builds and spawns shell commands and names exit failures.
//! - [`process_run`] supervises one run: stdin, output fan-out, progress,
//!   cancellation and the final result.
//! - [`cancel`] is the cancellation signal handed to a run.
//! - [`progress`] holds the wording and the reporter for progress lines.
//! - [`result`] is the immutable outcome of a run.

pub mod cancel;
pub mod command;
pub mod process_run;
pub mod progress;
pub mod result;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use command::CommandToSpawn;
pub use process_run::{ProcessRun, RunIo, RunSettings, run_process};
pub use progress::{LogProgress, ProgressOptions, ProgressReporter};
pub use result::RunResult;
