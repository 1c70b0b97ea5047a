use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use radar_core::ScanState;
use radar_engine::{HttpCatalog, JsonStateStore, ScanEngine, StateStore};
use radar_logging::{radar_error, radar_info, radar_warn};

use crate::config::{self, AppConfig};
use crate::schedule::DailySchedule;

type Engine = ScanEngine<HttpCatalog, JsonStateStore>;

fn catalog(config: &AppConfig) -> Result<HttpCatalog> {
    let credentials = config::credentials_from(config::env_var)?;
    HttpCatalog::new(config.catalog_settings(), credentials).context("failed to build HTTP client")
}

fn engine(config: &AppConfig) -> Result<Engine> {
    let scan = config.scan_config()?;
    let store = JsonStateStore::new(&config.state_path);
    Ok(ScanEngine::new(catalog(config)?, store, scan))
}

pub async fn run(config: &AppConfig) -> Result<()> {
    let mut engine = engine(config)?;
    let outcome = engine.run_once().await.context("scan run failed")?;
    println!("{outcome}");
    Ok(())
}

/// Runs now, then at every scheduled slot. Never returns on its own.
pub async fn watch(config: &AppConfig) -> Result<()> {
    let schedule = DailySchedule::parse(&config.schedule)?;
    let mut engine = engine(config)?;
    radar_info!("Watching; daily runs at {}", schedule);

    loop {
        match engine.run_once().await {
            Ok(outcome) => radar_info!("{}", outcome),
            Err(err) => radar_error!("Run failed: {}", err),
        }
        let wait = schedule.delay_until_next(Local::now());
        radar_info!("Next run in {} min", wait.as_secs() / 60);
        tokio::time::sleep(wait).await;
    }
}

pub fn status(config: &AppConfig) -> Result<()> {
    let store = JsonStateStore::new(&config.state_path);
    let state = store
        .load()
        .with_context(|| format!("failed to read {}", store.path().display()))?;
    print!("{}", render_status(&state));
    Ok(())
}

pub fn reset(config: &AppConfig) -> Result<()> {
    let store = JsonStateStore::new(&config.state_path);
    store
        .save(&ScanState::new())
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    radar_warn!("Scan state reset; next run bootstraps from scratch");
    println!("State at {} reset", store.path().display());
    Ok(())
}

pub async fn create_playlist(
    config: &AppConfig,
    name: &str,
    public: bool,
    description: Option<&str>,
) -> Result<()> {
    let id = catalog(config)?
        .create_collection(name, public, description)
        .await
        .context("failed to create playlist")?;
    radar_info!("Created playlist {} ({})", name, id);
    println!("{id}");
    println!("Set RADAR_PLAYLIST_ID={id} or playlist_id in the config to use it.");
    Ok(())
}

fn render_status(state: &ScanState) -> String {
    let last_run = state
        .last_run_timestamp()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map(|at| at.with_timezone(&Local).to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "phase: {:?}\ncursor: {}\nglobal watermark: {}\nproducers with watermark: {}\nlast run: {}\n",
        state.phase(),
        state.cursor(),
        state.global_watermark(),
        state.producer_watermarks().len(),
        last_run
    )
}
