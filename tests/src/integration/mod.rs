//! Cross-crate integration flows.

pub mod e2e;
pub mod liveness;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use grid_master::{Master, MasterConfig};
use grid_worker::{Worker, WorkerConfig};

/// Start a master with compressed test timings on an ephemeral port.
pub async fn start_master() -> (Arc<Master>, SocketAddr) {
    start_master_with(MasterConfig::for_testing()).await
}

/// Start a master with a custom config.
pub async fn start_master_with(config: MasterConfig) -> (Arc<Master>, SocketAddr) {
    let master = Arc::new(Master::new(config).expect("valid test config"));
    let addr = master.start().await.expect("master should bind");
    (master, addr)
}

/// Connect a worker and spawn its run loop.
pub async fn spawn_worker(
    addr: SocketAddr,
    worker_id: &str,
) -> (Arc<Worker>, tokio::task::JoinHandle<()>) {
    let config = WorkerConfig::for_testing(worker_id, "127.0.0.1", addr.port());
    let worker = Arc::new(Worker::connect(config).await.expect("worker should register"));
    let runner = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run().await })
    };
    (worker, runner)
}

/// Poll until the master sees `count` workers, or panic after one second.
pub async fn wait_for_worker_count(master: &Master, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        if master.worker_count() == count {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker count never reached {count} (currently {})",
            master.worker_count()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
