//! # MatrixGrid Worker
//!
//! The execution side of MatrixGrid: connects to the master, registers,
//! answers heartbeats, and runs matrix tasks on a bounded local pool.
//!
//! ## Lifecycle
//!
//! 1. [`Worker::connect`] dials the master, sends `REGISTER_WORKER`, and
//!    stores the runtime token from the `WORKER_ACK` reply.
//! 2. [`Worker::run`] drives the read loop: heartbeat pings are echoed
//!    immediately, `RPC_REQUEST`s are handed to the executor.
//! 3. The executor validates the echoed token before any computation, runs
//!    the matrix kernel, and replies `TASK_COMPLETE` or `TASK_ERROR`.
//!
//! The worker process runs until its launcher terminates it; a closed
//! master connection simply ends `run`.

pub mod config;
pub mod error;
pub mod executor;
pub mod worker;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use executor::TaskExecutor;
pub use worker::Worker;
