//! Worker registry: the master's set of live worker sessions.
//!
//! Enumeration order is insertion (registration) order, which pins the
//! hash-mod routing in `execute_task` to a reproducible target for a fixed
//! registry composition. The lock is never held across network I/O: callers
//! take an `Arc` snapshot of the handle they need and drop the guard before
//! touching the socket.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use grid_protocol::Session;
use parking_lot::RwLock;
use tracing::{debug, info};

/// One registered worker, exclusively owned by the registry. Other
/// components hold at most a borrowed `Arc` snapshot during dispatch.
pub struct WorkerHandle {
    worker_id: String,
    session: Arc<Session>,
    last_seen: RwLock<Instant>,
}

impl WorkerHandle {
    #[must_use]
    pub fn new(worker_id: impl Into<String>, session: Arc<Session>) -> Self {
        Self {
            worker_id: worker_id.into(),
            session,
            last_seen: RwLock::new(Instant::now()),
        }
    }

    /// Id the worker registered under.
    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// The worker's connection.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Refresh the liveness timestamp. Called for every inbound message
    /// from this worker, not just heartbeats.
    pub fn touch(&self) {
        *self.last_seen.write() = Instant::now();
    }

    /// Age of the last inbound traffic.
    #[must_use]
    pub fn last_seen_age(&self) -> Duration {
        self.last_seen.read().elapsed()
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("worker_id", &self.worker_id)
            .field("peer", &self.session.peer_addr())
            .finish()
    }
}

/// Insertion-ordered, concurrency-safe collection of worker handles.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: RwLock<Vec<Arc<WorkerHandle>>>,
}

impl WorkerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a worker. Registration order is preserved for routing.
    pub fn insert(&self, handle: Arc<WorkerHandle>) {
        let mut workers = self.workers.write();
        workers.push(handle.clone());
        info!(
            worker_id = %handle.worker_id(),
            peer = %handle.session().peer_addr(),
            count = workers.len(),
            "worker registered"
        );
    }

    /// Remove a specific handle (by identity, so duplicate worker ids on
    /// reconnect cannot evict the wrong session).
    pub fn remove(&self, handle: &Arc<WorkerHandle>) -> bool {
        let mut workers = self.workers.write();
        let before = workers.len();
        workers.retain(|w| !Arc::ptr_eq(w, handle));
        let removed = workers.len() < before;
        if removed {
            debug!(worker_id = %handle.worker_id(), count = workers.len(), "worker removed");
        }
        removed
    }

    /// Number of live workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }

    /// Deterministic routing: `hash(task_id) % len` over insertion order.
    /// Returns `None` when the registry is empty.
    #[must_use]
    pub fn route(&self, task_id: &str) -> Option<Arc<WorkerHandle>> {
        let workers = self.workers.read();
        if workers.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        task_id.hash(&mut hasher);
        let index = (hasher.finish() % workers.len() as u64) as usize;
        Some(Arc::clone(&workers[index]))
    }

    /// Snapshot of all handles, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<WorkerHandle>> {
        self.workers.read().clone()
    }

    /// Remove and return every worker whose liveness age exceeds `timeout`.
    /// Only the registry is mutated here; the caller closes the sessions
    /// after the lock is released.
    #[must_use]
    pub fn take_stale(&self, timeout: Duration) -> Vec<Arc<WorkerHandle>> {
        let mut workers = self.workers.write();
        let (stale, live): (Vec<_>, Vec<_>) = workers
            .drain(..)
            .partition(|w| w.last_seen_age() > timeout);
        *workers = live;
        stale
    }

    /// Remove and return every worker (shutdown path).
    #[must_use]
    pub fn drain(&self) -> Vec<Arc<WorkerHandle>> {
        let mut workers = self.workers.write();
        workers.drain(..).collect()
    }
}
