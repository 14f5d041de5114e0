//! Worker-side error types.

use grid_protocol::{SessionError, WireError};
use thiserror::Error;

/// Failures in the worker's connection and registration path. Task-level
/// failures never surface here; they travel back to the master as
/// `TASK_ERROR` replies.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The master rejected or mangled the registration handshake.
    #[error("registration failed: {0}")]
    Registration(String),

    /// Session-level failure on the master connection.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Wire-level failure decoding master traffic.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Connect-time I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
