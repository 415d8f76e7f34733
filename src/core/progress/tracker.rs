use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::utils::now_ms;

/// Latest known state of a long-running task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Fraction complete, 0.0 to 1.0
    pub progress: f32,
    pub message: String,
    pub done: bool,
    /// Unix millis of the last update or probe
    pub updated_ms: u64,
}

impl ProgressSnapshot {
    /// Snapshot stamped with the current time.
    pub fn new(progress: f32, message: impl Into<String>, done: bool) -> Self {
        Self {
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            done,
            updated_ms: now_ms(),
        }
    }

    /// Fraction complete rendered as a percentage.
    pub fn percent(&self) -> f32 {
        self.progress * 100.0
    }
}

/// Write/read side handed to tools so they can publish progress.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, task_id: &str, snapshot: ProgressSnapshot);
    fn query(&self, task_id: &str) -> Option<ProgressSnapshot>;
}

pub type ProgressHandle = Arc<dyn ProgressReporter>;

/// Registry of task id to latest snapshot.
///
/// One instance is shared by every session and by the probe loop. A single
/// coarse lock guards the map; critical sections never await.
#[derive(Default)]
pub struct ProgressTracker {
    tasks: Mutex<HashMap<String, ProgressSnapshot>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, task_id: &str) -> bool {
        self.tasks.lock().remove(task_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.lock().keys().cloned().collect()
    }

    /// Every tracked task, ordered by id.
    pub fn snapshots(&self) -> Vec<(String, ProgressSnapshot)> {
        let mut all: Vec<_> = self
            .tasks
            .lock()
            .iter()
            .map(|(id, snapshot)| (id.clone(), snapshot.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Collect tasks not updated for `stale_after_ms` and refresh their
    /// timestamp so the next probe waits a full threshold again.
    pub fn take_stale(&self, now: u64, stale_after_ms: u64) -> Vec<(String, ProgressSnapshot)> {
        let mut tasks = self.tasks.lock();
        tasks
            .iter_mut()
            .filter(|(_, snapshot)| now.saturating_sub(snapshot.updated_ms) >= stale_after_ms)
            .map(|(id, snapshot)| {
                snapshot.updated_ms = now;
                (id.clone(), snapshot.clone())
            })
            .collect()
    }
}

impl ProgressReporter for ProgressTracker {
    fn report(&self, task_id: &str, mut snapshot: ProgressSnapshot) {
        if snapshot.updated_ms == 0 {
            snapshot.updated_ms = now_ms();
        }
        info!(
            task_id = %task_id,
            progress = snapshot.progress,
            done = snapshot.done,
            "Progress update: {}",
            snapshot.message
        );
        self.tasks.lock().insert(task_id.to_string(), snapshot);
    }

    fn query(&self, task_id: &str) -> Option<ProgressSnapshot> {
        let snapshot = self.tasks.lock().get(task_id).cloned();
        if snapshot.is_none() {
            debug!(task_id = %task_id, "No progress tracked for task");
        }
        snapshot
    }
}
