//! Collaborators that record what a run did, for assertions.

use std::sync::{Arc, Mutex};

use buildrun::exec::{ProgressReporter, RunResult};
use buildrun::input::InputBlock;
use buildrun::runner::{BlockStatus, RunObserver};

/// Progress reporter that keeps every message.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&mut self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// One observed lifecycle update.
#[derive(Debug, Clone)]
pub enum ObservedUpdate {
    Pending { block: Option<String> },
    Finished { block: Option<String>, result: RunResult },
}

/// Observer that keeps every update, with blocks identified by label.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub updates: Vec<ObservedUpdate>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<&RunResult> {
        self.updates
            .iter()
            .filter_map(|u| match u {
                ObservedUpdate::Finished { result, .. } => Some(result),
                ObservedUpdate::Pending { .. } => None,
            })
            .collect()
    }

    pub fn pending_labels(&self) -> Vec<Option<String>> {
        self.updates
            .iter()
            .filter_map(|u| match u {
                ObservedUpdate::Pending { block } => Some(block.clone()),
                ObservedUpdate::Finished { .. } => None,
            })
            .collect()
    }
}

impl RunObserver for RecordingObserver {
    fn on_update(&mut self, block: Option<&InputBlock>, status: BlockStatus<'_>) {
        let block = block.map(InputBlock::label);
        self.updates.push(match status {
            BlockStatus::Pending => ObservedUpdate::Pending { block },
            BlockStatus::Finished(result) => ObservedUpdate::Finished {
                block,
                result: result.clone(),
            },
        });
    }
}
