//! Master configuration with validation.
//!
//! The launcher hands settings in through the environment: `MASTER_PORT` for
//! the listen port and `GRID_RUN_ID` for the sender id stamped on outbound
//! messages. Timing knobs keep the reference intervals by default and shrink
//! for tests via [`MasterConfig::for_testing`].

use std::time::Duration;

/// Reference heartbeat send interval (master -> worker pings).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Reference monitor sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2);

/// Reference liveness timeout before a worker is evicted.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reference per-task completion timeout.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Master configuration.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Listen port; 0 binds an ephemeral port (tests).
    pub port: u16,
    /// Sender id stamped on every outbound message.
    pub sender_id: String,
    /// Interval between heartbeat pings to each worker.
    pub heartbeat_interval: Duration,
    /// Interval between monitor sweeps of the registry.
    pub sweep_interval: Duration,
    /// Liveness age beyond which a worker is evicted.
    pub heartbeat_timeout: Duration,
    /// How long `execute_task` waits for a reply.
    pub task_timeout: Duration,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            port: 9999,
            sender_id: "grid-master".to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

impl MasterConfig {
    /// Load from the launcher's environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("MASTER_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(run_id) = std::env::var("GRID_RUN_ID") {
            if !run_id.is_empty() {
                config.sender_id = run_id;
            }
        }
        config
    }

    /// Validate the timing relationships.
    pub fn validate(&self) -> Result<(), String> {
        if self.sender_id.is_empty() {
            return Err("sender_id cannot be empty".to_string());
        }
        if self.heartbeat_interval.is_zero()
            || self.sweep_interval.is_zero()
            || self.heartbeat_timeout.is_zero()
            || self.task_timeout.is_zero()
        {
            return Err("intervals and timeouts cannot be zero".to_string());
        }
        if self.heartbeat_timeout <= self.heartbeat_interval {
            return Err("heartbeat_timeout must exceed heartbeat_interval".to_string());
        }
        Ok(())
    }

    /// Config for tests: ephemeral port, compressed timings.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            sender_id: "grid-master-test".to_string(),
            heartbeat_interval: Duration::from_millis(50),
            sweep_interval: Duration::from_millis(100),
            heartbeat_timeout: Duration::from_millis(400),
            task_timeout: Duration::from_secs(2),
        }
    }
}
