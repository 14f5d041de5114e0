//! Worker binary: reads the launcher's environment, connects to the master,
//! and serves tasks until terminated.

use anyhow::{Context, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use grid_worker::{Worker, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting tracing subscriber")?;

    let config = WorkerConfig::from_env();
    info!(
        worker_id = %config.worker_id,
        master = %format!("{}:{}", config.master_host, config.master_port),
        "worker starting"
    );

    let worker = Worker::connect(config)
        .await
        .context("connecting to master")?;
    worker.run().await;
    info!("worker stopped");
    Ok(())
}
