// src/runner/sequential.rs

//! Runs one process per input block, in order, stopping at the first
//! execution failure.

use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::{
    CancelToken, CommandToSpawn, ProgressOptions, ProgressReporter, RunIo, RunResult, RunSettings,
    run_process,
};
use crate::input::InputBlock;
use crate::sink::RevealSurface;

/// Lifecycle step of one block.
#[derive(Debug, Clone, Copy)]
pub enum BlockStatus<'a> {
    /// About to start.
    Pending,
    Finished(&'a RunResult),
}

/// Receives the pending/result lifecycle of every block that runs.
///
/// `block` is `None` for the single run performed when there are no input
/// blocks at all.
pub trait RunObserver {
    fn on_update(&mut self, block: Option<&InputBlock>, status: BlockStatus<'_>);
}

impl<T: RunObserver + ?Sized> RunObserver for &mut T {
    fn on_update(&mut self, block: Option<&InputBlock>, status: BlockStatus<'_>) {
        (**self).on_update(block, status);
    }
}

/// Observer that ignores every update.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_update(&mut self, _block: Option<&InputBlock>, _status: BlockStatus<'_>) {}
}

pub struct SequentialRunner<'a> {
    settings: RunSettings,
    surface: &'a mut dyn RevealSurface,
    progress: &'a mut dyn ProgressReporter,
    cancel: CancelToken,
}

impl<'a> SequentialRunner<'a> {
    pub fn new(
        settings: RunSettings,
        surface: &'a mut dyn RevealSurface,
        progress: &'a mut dyn ProgressReporter,
        cancel: CancelToken,
    ) -> Self {
        Self {
            settings,
            surface,
            progress,
            cancel,
        }
    }

    /// Run `command` once, outside any block sequence (e.g. a build step).
    pub async fn run_one(
        &mut self,
        command: &CommandToSpawn,
        options: &ProgressOptions,
        input: Option<&InputBlock>,
    ) -> RunResult {
        let io = RunIo {
            surface: &mut *self.surface,
            progress: &mut *self.progress,
            cancel: self.cancel.clone(),
        };
        run_process(command, options, input, &self.settings, io).await
    }

    /// Run `command` once per block in declared order.
    ///
    /// The observer sees `Pending` before and `Finished` after each block.
    /// The first block whose execution fails ends the sequence; a mismatched
    /// output does not. With no blocks, the command runs once without input.
    /// Returns the results of the blocks that ran.
    pub async fn run_all(
        &mut self,
        command: &CommandToSpawn,
        blocks: &[InputBlock],
        observer: &mut dyn RunObserver,
    ) -> Vec<RunResult> {
        let options = ProgressOptions::running();
        let mut results = Vec::with_capacity(blocks.len().max(1));

        if blocks.is_empty() {
            let result = self.run_block(command, &options, None, observer).await;
            results.push(result);
            return results;
        }

        if let Err(err) = self
            .drive(command, &options, blocks, observer, &mut results)
            .await
        {
            info!(
                error = %err,
                ran = results.len(),
                skipped = blocks.len() - results.len(),
                "stopping input sequence after execution failure"
            );
        }
        results
    }

    async fn drive(
        &mut self,
        command: &CommandToSpawn,
        options: &ProgressOptions,
        blocks: &[InputBlock],
        observer: &mut dyn RunObserver,
        results: &mut Vec<RunResult>,
    ) -> Result<()> {
        for block in blocks {
            self.surface.append(&format!("\n[{}]\n", block.label()));
            let result = self.run_block(command, options, Some(block), observer).await;
            let outcome = result.check_execution();
            results.push(result);
            outcome?;
        }
        Ok(())
    }

    async fn run_block(
        &mut self,
        command: &CommandToSpawn,
        options: &ProgressOptions,
        block: Option<&InputBlock>,
        observer: &mut dyn RunObserver,
    ) -> RunResult {
        let id = block.map_or_else(|| "null".to_string(), InputBlock::id);
        debug!(block = %id, "starting block");
        observer.on_update(block, BlockStatus::Pending);
        let result = self.run_one(command, options, block).await;
        observer.on_update(block, BlockStatus::Finished(&result));
        result
    }
}
