//! Result store: single-use mapping from task id to outcome.
//!
//! Flow:
//! 1. `execute_task` calls [`ResultStore::register`] and gets a oneshot
//!    receiver before the request leaves the master.
//! 2. The connection pump receives `TASK_COMPLETE`/`TASK_ERROR` and calls
//!    [`ResultStore::complete`], which removes the entry and notifies the
//!    waiter.
//! 3. On timeout the waiter calls [`ResultStore::discard`] so nothing
//!    dangles.
//!
//! A completion for an unknown task id (late reply after timeout, or a
//! worker inventing ids) is an inert no-op, logged and dropped; it can never
//! reanimate a call that has already returned.

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::MasterError;

/// Terminal outcome of one dispatched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Worker replied `TASK_COMPLETE`.
    Success {
        result: String,
        worker_id: String,
    },
    /// Worker replied `TASK_ERROR`; `message` is the worker's text verbatim.
    Failure {
        message: String,
        worker_id: String,
    },
}

/// Concurrency-safe, single-consumer pending-result map.
#[derive(Default)]
pub struct ResultStore {
    pending: DashMap<String, oneshot::Sender<TaskOutcome>>,
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `task_id`. In-flight task ids must be unique.
    pub fn register(
        &self,
        task_id: &str,
    ) -> Result<oneshot::Receiver<TaskOutcome>, MasterError> {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(task_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(MasterError::DuplicateTask(task_id.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Deliver an outcome. Returns `false` when no waiter exists (late or
    /// unsolicited reply) or the waiter already gave up.
    pub fn complete(&self, task_id: &str, outcome: TaskOutcome) -> bool {
        match self.pending.remove(task_id) {
            Some((_, tx)) => match tx.send(outcome) {
                Ok(()) => true,
                Err(_) => {
                    debug!(task_id, "waiter gone before completion");
                    false
                }
            },
            None => {
                debug!(task_id, "completion for unknown task id, dropping");
                false
            }
        }
    }

    /// Drop the waiter entry for `task_id` (timeout path).
    pub fn discard(&self, task_id: &str) {
        self.pending.remove(task_id);
    }

    /// Number of tasks currently awaiting an outcome.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every waiter (shutdown). Their receivers resolve to an error the
    /// dispatcher maps to [`MasterError::Shutdown`].
    pub fn abandon_all(&self) {
        self.pending.clear();
    }
}
