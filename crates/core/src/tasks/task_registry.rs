use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::tasks::domain::task::{TaskId, TaskState, TaskStatus};

/// When finished tasks may be dropped from the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep terminal tasks until the caller acknowledges them.
    UntilAcknowledged,
    /// Also evict terminal tasks this long after they finished.
    ExpireAfter(Duration),
}

struct TaskRecord {
    state: TaskState,
    result: Option<PathBuf>,
    cancelled: Arc<AtomicBool>,
    finished_at: Option<Instant>,
}

impl TaskRecord {
    fn set_state(&mut self, state: TaskState) {
        if self.state.is_terminal() {
            return;
        }
        if state.is_terminal() {
            self.finished_at = Some(Instant::now());
        }
        self.state = state;
    }
}

/// In-memory registry of submitted tasks.
///
/// The map is only write-locked to add or remove entries. Each entry has its
/// own lock, so a running pipeline updating its task never blocks other tasks.
/// Once a task reaches a terminal state, further updates are ignored.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<Mutex<TaskRecord>>>>,
    retention: RetentionPolicy,
}

impl TaskRegistry {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Adds a task in the `Queued` state and returns its id and cancellation flag.
    pub fn register(&self) -> (TaskId, Arc<AtomicBool>) {
        let id = TaskId::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        let record = TaskRecord {
            state: TaskState::Queued,
            result: None,
            cancelled: cancelled.clone(),
            finished_at: None,
        };
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(record)));
        (id, cancelled)
    }

    fn record(&self, id: &TaskId) -> Option<Arc<Mutex<TaskRecord>>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn with_record<R>(&self, id: &TaskId, f: impl FnOnce(&mut TaskRecord) -> R) -> Option<R> {
        let record = self.record(id)?;
        let mut guard = lock(&record);
        Some(f(&mut guard))
    }

    /// Records a state transition. Returns false for unknown ids.
    pub fn set_state(&self, id: &TaskId, state: TaskState) -> bool {
        self.with_record(id, |r| r.set_state(state)).is_some()
    }

    /// Marks the task `Completed` with its artifact path.
    pub fn complete(&self, id: &TaskId, result: PathBuf) -> bool {
        self.with_record(id, |r| {
            if !r.state.is_terminal() {
                r.result = Some(result);
                r.set_state(TaskState::Completed);
            }
        })
        .is_some()
    }

    pub fn status(&self, id: &TaskId) -> TaskStatus {
        self.with_record(id, |r| TaskStatus {
            state: Some(r.state.clone()),
            result: r.result.clone(),
        })
        .unwrap_or_else(TaskStatus::not_found)
    }

    /// Requests cancellation. Returns false if the task is unknown or already finished.
    ///
    /// A task that has not started yet is marked `Cancelled` immediately.
    pub fn cancel(&self, id: &TaskId) -> bool {
        self.with_record(id, |r| {
            if r.state.is_terminal() {
                return false;
            }
            r.cancelled.store(true, Ordering::Relaxed);
            if r.state == TaskState::Queued {
                r.set_state(TaskState::Cancelled);
            }
            true
        })
        .unwrap_or(false)
    }

    /// Drops a finished task. Returns false if it is unknown or still running.
    pub fn acknowledge(&self, id: &TaskId) -> bool {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let terminal = tasks
            .get(id)
            .map(|r| lock(r).state.is_terminal())
            .unwrap_or(false);
        if terminal {
            tasks.remove(id);
        }
        terminal
    }

    /// Removes a task regardless of state.
    pub(crate) fn remove(&self, id: &TaskId) {
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Evicts terminal tasks older than the retention window. Returns how many were removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let RetentionPolicy::ExpireAfter(window) = self.retention else {
            return 0;
        };
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, record| match lock(record).finished_at {
            Some(finished) => now.saturating_duration_since(finished) < window,
            None => true,
        });
        let evicted = before - tasks.len();
        if evicted > 0 {
            log::debug!("Evicted {evicted} expired task(s)");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(RetentionPolicy::UntilAcknowledged)
    }
}

fn lock(record: &Mutex<TaskRecord>) -> MutexGuard<'_, TaskRecord> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}
