//! Progress reporting for long-running operations

use serde::Serialize;
use std::sync::Mutex;

/// A point-in-time progress report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "phase")]
pub enum ProgressEvent {
    /// Objects received from a remote
    Transfer {
        received_objects: usize,
        total_objects: usize,
        received_bytes: usize,
    },
    /// Files written to the working tree
    Checkout { completed: usize, total: usize },
    /// Session caches recomputed after an operation
    Refreshed { entries: usize, commits: usize },
}

/// Observer notified synchronously at well-defined points of an operation
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Observer that keeps every event, mostly useful to callers that poll
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event.clone());
    }
}
