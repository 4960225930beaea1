use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod authz;
mod config;
mod dbus;
mod engine;
mod materializer;
mod service;

use config::Config;
use dbus::AttendanceInterface;
use materializer::Materializer;
use rollcall_store::Store;
use service::AttendanceService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(db = %config.db_path.display(), "rollcalld starting");

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let store = Store::open(&config.db_path)
        .await
        .context("opening attendance database")?;

    let engine = engine::spawn_engine(config.engine_queue_depth)?;
    let service = AttendanceService::new(store.clone(), engine, config.tolerance);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let materializer_task = tokio::spawn(Materializer::new(store, &config).run(shutdown_rx));

    let _conn = zbus::connection::Builder::session()
        .context("connecting to session bus")?
        .name("org.rollcall.Attendance1")?
        .serve_at(
            "/org/rollcall/Attendance1",
            AttendanceInterface::new(service),
        )?
        .build()
        .await
        .context("registering bus name")?;

    tracing::info!("rollcalld ready");
    tokio::signal::ctrl_c().await?;

    tracing::info!("rollcalld shutting down");
    let _ = shutdown_tx.send(true);
    let _ = materializer_task.await;
    Ok(())
}
