//! `radar.ron` settings, environment overrides and their mapping onto engine types.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::LevelFilter;
use radar_engine::{CatalogSettings, Credentials, ScanConfig};
use serde::{Deserialize, Serialize};

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_PATH: &str = "radar.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub destination: LogDestination,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    pub file: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            destination: LogDestination::Terminal,
            level: "info".to_string(),
            file: PathBuf::from("./radar.log"),
        }
    }
}

impl LogSettings {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid log level {:?}", self.level))
    }
}

/// Every field is optional in the file; absent ones keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub playlist_id: Option<String>,
    pub state_path: PathBuf,
    /// Local wall-clock run times for `watch`, as `HH:MM`.
    pub schedule: Vec<String>,
    pub once_per_day: bool,
    pub budget_ceiling: u32,
    pub throttle_margin_secs: u64,
    pub unit_delay_ms: u64,
    pub bootstrap_release_limit: usize,
    pub monitor_release_limit: usize,
    pub market: Option<String>,
    pub api_base_url: String,
    pub token_url: String,
    pub log: LogSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        let scan = ScanConfig::new(String::new());
        let catalog = CatalogSettings::default();
        Self {
            playlist_id: None,
            state_path: PathBuf::from("radar_state.json"),
            schedule: vec!["09:00".to_string(), "21:00".to_string()],
            once_per_day: scan.once_per_day,
            budget_ceiling: scan.budget_ceiling,
            throttle_margin_secs: scan.throttle_margin.as_secs(),
            unit_delay_ms: u64::try_from(scan.unit_delay.as_millis()).unwrap_or(u64::MAX),
            bootstrap_release_limit: scan.bootstrap_release_limit,
            monitor_release_limit: scan.monitor_release_limit,
            market: catalog.market,
            api_base_url: catalog.api_base_url,
            token_url: catalog.token_url,
            log: LogSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads a RON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        ron::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("RADAR_PLAYLIST_ID").or_else(|| lookup("PLAYLIST_ID")) {
            self.playlist_id = Some(id);
        }
        if let Some(path) = lookup("RADAR_STATE_PATH") {
            self.state_path = PathBuf::from(path);
        }
    }

    pub fn scan_config(&self) -> Result<ScanConfig> {
        let Some(playlist_id) = self.playlist_id.as_deref().filter(|id| !id.trim().is_empty())
        else {
            bail!("no playlist configured; set playlist_id, RADAR_PLAYLIST_ID or --playlist");
        };
        let mut scan = ScanConfig::new(playlist_id);
        scan.budget_ceiling = self.budget_ceiling;
        scan.throttle_margin = Duration::from_secs(self.throttle_margin_secs);
        scan.unit_delay = Duration::from_millis(self.unit_delay_ms);
        scan.bootstrap_release_limit = self.bootstrap_release_limit;
        scan.monitor_release_limit = self.monitor_release_limit;
        scan.once_per_day = self.once_per_day;
        Ok(scan)
    }

    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            api_base_url: self.api_base_url.clone(),
            token_url: self.token_url.clone(),
            market: self.market.clone(),
            ..CatalogSettings::default()
        }
    }
}

/// A ready access token wins over the refresh-token grant.
///
/// Client id and secret also accept the `SPOTIPY_*` names older `.env` files use.
pub fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    if let Some(token) = lookup("SPOTIFY_ACCESS_TOKEN") {
        return Ok(Credentials::Bearer(token));
    }
    match (
        lookup("SPOTIFY_CLIENT_ID").or_else(|| lookup("SPOTIPY_CLIENT_ID")),
        lookup("SPOTIFY_CLIENT_SECRET").or_else(|| lookup("SPOTIPY_CLIENT_SECRET")),
        lookup("SPOTIFY_REFRESH_TOKEN"),
    ) {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => {
            Ok(Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            })
        }
        _ => bail!(
            "missing credentials; set SPOTIFY_ACCESS_TOKEN or SPOTIFY_CLIENT_ID, \
             SPOTIFY_CLIENT_SECRET and SPOTIFY_REFRESH_TOKEN"
        ),
    }
}

/// Process environment lookup treating blank values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
