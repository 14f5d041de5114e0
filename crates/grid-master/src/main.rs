//! Master binary: reads the launcher's environment, starts the listener,
//! and runs until interrupted.

use anyhow::{Context, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use grid_master::{Master, MasterConfig};

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

    let config = MasterConfig::from_env();
    let master = Master::new(config).context("invalid master configuration")?;
    let addr = master.start().await.context("starting master listener")?;
    info!(%addr, token = %master.runtime_token(), "master ready");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    master.shutdown().await;
    info!("master stopped");
    Ok(())
}
