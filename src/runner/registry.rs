// src/runner/registry.rs

//! Registry of active runs, keyed by document.
//!
//! At most one run per document is active: starting a new one cancels the
//! previous one. Entries are removed explicitly when a run finishes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::exec::{CancelHandle, CancelToken, cancel_pair};

/// Identifies one registration; used to remove exactly that entry later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSlot {
    document: String,
    generation: u64,
}

impl RunSlot {
    pub fn document(&self) -> &str {
        &self.document
    }
}

#[derive(Debug, Default)]
struct Entries {
    next_generation: u64,
    active: HashMap<String, (u64, CancelHandle)>,
}

#[derive(Debug, Default)]
pub struct RunRegistry {
    inner: Mutex<Entries>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new run for `document`, cancelling any run it replaces.
    pub fn begin(&self, document: impl Into<String>) -> (RunSlot, CancelToken) {
        let document = document.into();
        let (handle, token) = cancel_pair();

        let mut entries = self.entries();
        entries.next_generation += 1;
        let generation = entries.next_generation;
        if let Some((_, previous)) = entries
            .active
            .insert(document.clone(), (generation, handle))
        {
            info!(document = %document, "replacing active run; cancelling previous one");
            previous.cancel();
        }

        (RunSlot { document, generation }, token)
    }

    /// Remove the entry for a finished run. A newer run registered for the
    /// same document is left alone.
    pub fn finish(&self, slot: &RunSlot) {
        let mut entries = self.entries();
        let current = entries.active.get(&slot.document).map(|(g, _)| *g);
        if current == Some(slot.generation) {
            entries.active.remove(&slot.document);
            debug!(document = %slot.document, "run finished");
        }
    }

    /// Cancel the active run of `document`, if any.
    pub fn cancel(&self, document: &str) -> bool {
        match self.entries().active.get(document) {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every active run. Returns whether there was anything to cancel.
    pub fn cancel_all(&self) -> bool {
        let entries = self.entries();
        for (document, (_, handle)) in &entries.active {
            info!(document = %document, "cancelling run");
            handle.cancel();
        }
        !entries.active.is_empty()
    }

    pub fn is_active(&self, document: &str) -> bool {
        self.entries().active.contains_key(document)
    }

    pub fn active_count(&self) -> usize {
        self.entries().active.len()
    }
}
