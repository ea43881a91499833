// src/exec/result.rs

use std::time::Duration;

use crate::errors::{BuildRunError, Result};
use crate::input::InputBlock;
use crate::verify::OutputCheck;

/// Outcome of one process run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    input: Option<InputBlock>,
    job: String,
    failure: Option<String>,
    output: OutputCheck,
    captured_output: String,
    duration: Duration,
}

impl RunResult {
    pub(crate) fn new(
        input: Option<InputBlock>,
        job: String,
        failure: Option<String>,
        output: OutputCheck,
        captured_output: String,
        duration: Duration,
    ) -> Self {
        Self {
            input,
            job,
            failure,
            output,
            captured_output,
            duration,
        }
    }

    /// The input block this run was fed, if any.
    pub fn input(&self) -> Option<&InputBlock> {
        self.input.as_ref()
    }

    /// True when the process exited with code 0 and was neither signalled nor
    /// killed.
    pub fn execution_ok(&self) -> bool {
        self.failure.is_none()
    }

    /// Exit code or signal name of a failed run.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn output_check(&self) -> OutputCheck {
        self.output
    }

    /// `Some(verdict)` if an expected output was declared, `None` otherwise.
    pub fn output_ok(&self) -> Option<bool> {
        self.output.as_option()
    }

    /// Output shown for the run; after an overflow this ends with a pointer
    /// to the file holding the full output.
    pub fn captured_output(&self) -> &str {
        &self.captured_output
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }

    /// `Err(ExecutionFailed)` for a failed run, so callers can stop a
    /// sequence with `?`.
    pub fn check_execution(&self) -> Result<()> {
        match &self.failure {
            None => Ok(()),
            Some(failure) => Err(BuildRunError::ExecutionFailed {
                job: self.job.clone(),
                failure: failure.clone(),
            }),
        }
    }

    /// Passed = executed fine and output (if checked) matched.
    pub fn passed(&self) -> bool {
        self.execution_ok() && self.output != OutputCheck::Mismatched
    }
}
