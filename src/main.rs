use anyhow::Context;
use forex_alerts::scheduler::SyncScheduler;
use forex_alerts::state::AppState;
use forex_alerts::sync::currencies::seed_currencies;
use forex_alerts::sync::engine::{SyncEngine, DEFAULT_API_URL};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 6 * 60 * 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("forex_alerts=debug,info")),
        )
        .init();

    let data_dir = std::env::var("FOREX_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
    let api_url = std::env::var("FOREX_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let api_url = Url::parse(&api_url).context("invalid FOREX_API_URL")?;
    let interval_secs = std::env::var("FOREX_SYNC_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);

    tracing::info!("Starting forex-alerts, data dir {}", data_dir.display());

    let state = AppState::new(&data_dir)?;
    seed_currencies(&state.db, &state.config)?;

    let engine = Arc::new(SyncEngine::new(
        state.db.clone(),
        state.config.clone(),
        state.events.clone(),
        api_url,
    )?);

    let scheduler = SyncScheduler::new(engine, Duration::from_secs(interval_secs));
    let handle = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    handle.abort();

    Ok(())
}
