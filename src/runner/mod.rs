// src/runner/mod.rs

//! Driving runs over a file's input blocks.
//!
//! - [`sequential`] runs one process per block and stops at the first
//!   execution failure.
//! - [`report`] turns the runner's updates into per-block verdicts.
//! - [`registry`] tracks the active run of each document for cancellation.
//! - [`session`] resolves a file's build/run commands and drives them.

pub mod registry;
pub mod report;
pub mod sequential;
pub mod session;

pub use registry::{RunRegistry, RunSlot};
pub use report::{BlockReport, OutputDiff, TestReport, Verdict};
pub use sequential::{BlockStatus, NoopObserver, RunObserver, SequentialRunner};
pub use session::{CommandPlan, SessionOutcome, execute};
