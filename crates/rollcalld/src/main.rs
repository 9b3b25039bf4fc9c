use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use rollcall_store::AttendanceStore;

mod config;
mod dbus_interface;
mod engine;

use dbus_interface::AttendanceService;
use engine::DecisionEngine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = config::Config::load();
    if let Some(dir) = config.db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let store = AttendanceStore::open(&config.db_path).await?;
    let engine = Arc::new(DecisionEngine::new(store, config.thresholds(), config.period).await?);
    let service = AttendanceService::new(engine);

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _conn = builder
        .name("org.rollcall.Attendance1")?
        .serve_at("/org/rollcall/Attendance1", service)?
        .build()
        .await?;

    tracing::info!("rollcalld ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
