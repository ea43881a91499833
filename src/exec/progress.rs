// src/exec/progress.rs

//! Progress reporting for running jobs.

use std::time::Duration;

use tracing::debug;

/// Receives periodic "still running" messages.
pub trait ProgressReporter: Send {
    fn report(&mut self, message: &str);
}

impl<T: ProgressReporter + ?Sized> ProgressReporter for &mut T {
    fn report(&mut self, message: &str) {
        (**self).report(message);
    }
}

/// Reporter that only logs at debug level.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&mut self, message: &str) {
        debug!(progress = %message, "job progress");
    }
}

/// Wording for a job's progress and completion lines.
///
/// The presets match the build and run phases:
/// - [`ProgressOptions::building`]: `Building 1.2s`, `[Built in …]`,
///   `[Build failed in … with code …]`
/// - [`ProgressOptions::running`]: `Running 1.2s`, `[Finished in …]`,
///   `[Failed in … with code …]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOptions {
    pub job_name: String,
    pub success_label: String,
    pub failure_label: String,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self::new("Building")
    }
}

impl ProgressOptions {
    pub fn new(job_name: impl Into<String>) -> Self {
        let job_name = job_name.into();
        Self {
            success_label: format!("{job_name} finished"),
            failure_label: format!("{job_name} failed"),
            job_name,
        }
    }

    pub fn building() -> Self {
        Self {
            job_name: "Building".to_string(),
            success_label: "Built".to_string(),
            failure_label: "Build failed".to_string(),
        }
    }

    pub fn running() -> Self {
        Self {
            job_name: "Running".to_string(),
            success_label: "Finished".to_string(),
            failure_label: "Failed".to_string(),
        }
    }

    pub fn report_message(&self, elapsed: Duration) -> String {
        format!("{} {:.1}s", self.job_name, elapsed.as_secs_f64())
    }

    pub fn success_message(&self, elapsed: Duration) -> String {
        format!("\n[{} in {:.3}s]\n", self.success_label, elapsed.as_secs_f64())
    }

    pub fn failure_message(&self, elapsed: Duration, failure: &str) -> String {
        format!(
            "\n[{} in {:.3}s with code {}]\n",
            self.failure_label,
            elapsed.as_secs_f64(),
            failure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_wording_uses_job_name() {
        let opts = ProgressOptions::default();
        assert_eq!(opts.report_message(Duration::from_millis(1300)), "Building 1.3s");
        assert_eq!(
            opts.success_message(Duration::from_millis(1500)),
            "\n[Building finished in 1.500s]\n"
        );
        assert_eq!(
            opts.failure_message(Duration::from_millis(20), "2"),
            "\n[Building failed in 0.020s with code 2]\n"
        );
    }

    #[test]
    fn presets() {
        assert_eq!(
            ProgressOptions::building().success_message(Duration::ZERO),
            "\n[Built in 0.000s]\n"
        );
        assert_eq!(
            ProgressOptions::running().failure_message(Duration::ZERO, "SIGKILL"),
            "\n[Failed in 0.000s with code SIGKILL]\n"
        );
    }
}
