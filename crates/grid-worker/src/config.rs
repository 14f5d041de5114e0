//! Worker configuration from the launcher's environment.

use std::time::Duration;

/// Reference interval between worker-initiated heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Reference bound on concurrently executing tasks.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 3;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Id sent in the registration payload.
    pub worker_id: String,
    /// Master host to dial.
    pub master_host: String,
    /// Master port to dial.
    pub master_port: u16,
    /// Sender id stamped on outbound messages (defaults to the worker id).
    pub sender_id: String,
    /// Interval between worker-initiated heartbeats.
    pub heartbeat_interval: Duration,
    /// Bound on concurrently executing tasks.
    pub max_concurrent_tasks: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-1".to_string(),
            master_host: "localhost".to_string(),
            master_port: 9999,
            sender_id: "worker-1".to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
        }
    }
}

impl WorkerConfig {
    /// Load from `WORKER_ID` / `MASTER_HOST` / `MASTER_PORT` / `GRID_RUN_ID`,
    /// falling back to the defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(id) = std::env::var("WORKER_ID") {
            if !id.is_empty() {
                config.sender_id = id.clone();
                config.worker_id = id;
            }
        }
        if let Ok(host) = std::env::var("MASTER_HOST") {
            if !host.is_empty() {
                config.master_host = host;
            }
        }
        if let Ok(port) = std::env::var("MASTER_PORT") {
            if let Ok(port) = port.parse() {
                config.master_port = port;
            }
        }
        if let Ok(run_id) = std::env::var("GRID_RUN_ID") {
            if !run_id.is_empty() {
                config.sender_id = run_id;
            }
        }
        config
    }

    /// Config pointed at a test master, with compressed heartbeat timing.
    #[must_use]
    pub fn for_testing(worker_id: &str, host: &str, port: u16) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            master_host: host.to_string(),
            master_port: port,
            sender_id: worker_id.to_string(),
            heartbeat_interval: Duration::from_millis(50),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
        }
    }

    /// Validate the knobs.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_id.is_empty() {
            return Err("worker_id cannot be empty".to_string());
        }
        if self.master_host.is_empty() {
            return Err("master_host cannot be empty".to_string());
        }
        if self.heartbeat_interval.is_zero() {
            return Err("heartbeat_interval cannot be zero".to_string());
        }
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks cannot be zero".to_string());
        }
        Ok(())
    }
}
