//! # MatrixGrid Master
//!
//! The coordination side of MatrixGrid: accepts worker registrations over
//! TCP, tracks their liveness, dispatches matrix tasks, and aggregates the
//! results.
//!
//! ## Structure
//!
//! - `config` - timing knobs and launcher-provided settings
//! - `registry` - insertion-ordered set of live worker sessions
//! - `monitor` - periodic sweep evicting workers that stopped heartbeating
//! - `results` - single-use task id -> outcome store (notify on arrival)
//! - `service` - accept loop, per-connection pumps, task dispatch
//!
//! ## Lifecycle
//!
//! 1. `Master::start` binds the listener and spawns the accept loop and the
//!    heartbeat monitor.
//! 2. Workers connect, send `REGISTER_WORKER`, and receive the run-wide
//!    runtime token in `WORKER_ACK`.
//! 3. Callers drive `Master::execute_task`, which routes by task id hash
//!    over the registry's insertion order and waits for the worker's reply
//!    up to the task timeout.
//! 4. `Master::shutdown` stops accepting, closes every session, and releases
//!    the background tasks.
//!
//! Connection failures stay local to the affected session; the accept loop
//! and other workers are never torn down by one bad peer.

pub mod config;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod results;
pub mod service;

pub use config::MasterConfig;
pub use error::MasterError;
pub use registry::{WorkerHandle, WorkerRegistry};
pub use results::{ResultStore, TaskOutcome};
pub use service::Master;
