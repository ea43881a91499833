// src/runner/report.rs

//! Per-block test verdicts built from the runner's lifecycle updates.

use std::fmt::Write as _;
use std::time::Duration;

use tracing::debug;

use crate::input::InputBlock;
use crate::runner::sequential::{BlockStatus, RunObserver};

/// Expected vs actual output of a block whose output did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDiff {
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Queued,
    Started,
    Passed,
    Failed {
        message: String,
        diff: Option<OutputDiff>,
    },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub id: String,
    pub label: String,
    pub verdict: Verdict,
    pub duration: Option<Duration>,
}

/// Collects one verdict per input block of a file.
///
/// Blocks that never produced a result are marked [`Verdict::Skipped`] by
/// [`TestReport::end`]; updates after that are ignored.
#[derive(Debug, Clone, Default)]
pub struct TestReport {
    entries: Vec<BlockReport>,
    ended: bool,
}

impl TestReport {
    pub fn new(blocks: &[InputBlock]) -> Self {
        let entries = blocks
            .iter()
            .map(|block| BlockReport {
                id: block.id(),
                label: block.label(),
                verdict: Verdict::Queued,
                duration: None,
            })
            .collect();
        Self {
            entries,
            ended: false,
        }
    }

    fn entry_mut(&mut self, block: &InputBlock) -> Option<&mut BlockReport> {
        let id = block.id();
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        for entry in &mut self.entries {
            if matches!(entry.verdict, Verdict::Queued | Verdict::Started) {
                entry.verdict = Verdict::Skipped;
            }
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn entries(&self) -> &[BlockReport] {
        &self.entries
    }

    pub fn count(&self, pred: impl Fn(&Verdict) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.verdict)).count()
    }

    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(|e| e.verdict == Verdict::Passed)
    }

    /// Human-readable summary, one line per block plus a totals line.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let _ = match &entry.verdict {
                Verdict::Passed => writeln!(out, "PASS  {}", entry.label),
                Verdict::Skipped => writeln!(out, "SKIP  {}", entry.label),
                Verdict::Queued | Verdict::Started => writeln!(out, "....  {}", entry.label),
                Verdict::Failed { message, diff } => {
                    let _ = writeln!(out, "FAIL  {}: {}", entry.label, message);
                    match diff {
                        Some(diff) => writeln!(
                            out,
                            "      expected: {:?}\n      actual:   {:?}",
                            diff.expected.trim_end(),
                            diff.actual.trim_end()
                        ),
                        None => Ok(()),
                    }
                }
            };
        }
        let passed = self.count(|v| *v == Verdict::Passed);
        let failed = self.count(|v| matches!(v, Verdict::Failed { .. }));
        let skipped = self.count(|v| *v == Verdict::Skipped);
        let _ = write!(out, "{passed} passed, {failed} failed, {skipped} skipped");
        out
    }
}

impl RunObserver for TestReport {
    fn on_update(&mut self, block: Option<&InputBlock>, status: BlockStatus<'_>) {
        if self.ended {
            return;
        }
        let Some(block) = block else {
            return;
        };
        let Some(entry) = self.entry_mut(block) else {
            debug!(block = %block.id(), "update for unknown block ignored");
            return;
        };

        match status {
            BlockStatus::Pending => entry.verdict = Verdict::Started,
            BlockStatus::Finished(result) => {
                entry.duration = Some(result.duration());
                entry.verdict = if !result.execution_ok() {
                    Verdict::Failed {
                        message: "Program execution failed".to_string(),
                        diff: None,
                    }
                } else if result.output_ok() == Some(false) {
                    Verdict::Failed {
                        message: "Incorrect output".to_string(),
                        diff: Some(OutputDiff {
                            expected: block.expected.as_str().unwrap_or_default().to_string(),
                            actual: result.captured_output().to_string(),
                        }),
                    }
                } else {
                    Verdict::Passed
                };
            }
        }
    }
}
