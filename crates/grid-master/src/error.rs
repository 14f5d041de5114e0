//! Master-side error types.

use grid_protocol::{SessionError, WireError};
use thiserror::Error;

/// Failures surfaced to `execute_task` callers and the service loops.
#[derive(Debug, Error)]
pub enum MasterError {
    /// The registry is empty; nothing can run the task.
    #[error("no workers available")]
    NoWorkersAvailable,

    /// No reply arrived within the task timeout.
    #[error("task timeout: {task_id}")]
    TaskTimeout { task_id: String },

    /// The worker reported a failure; `message` is propagated verbatim.
    #[error("task failed on worker {worker_id}: {message}")]
    TaskExecution { worker_id: String, message: String },

    /// A task with this id is already awaiting a result.
    #[error("task id already in flight: {0}")]
    DuplicateTask(String),

    /// The master is shutting down; pending waits are abandoned.
    #[error("master is shutting down")]
    Shutdown,

    /// `start` was called on an already-started master.
    #[error("master already started")]
    AlreadyStarted,

    /// Session-level failure on the routed worker's connection.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Wire-level failure while talking to a worker.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Listener-level I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
