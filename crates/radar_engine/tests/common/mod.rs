#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use radar_core::{Producer, Release, ReleaseDate, ReleaseKind, ScanState, Track, TrackUri};
use radar_engine::{
    CatalogClient, CatalogError, CatalogErrorKind, PersistError, ScanConfig, StateStore,
};

pub fn init_logging() {
    radar_logging::initialize_for_tests();
}

pub fn track_uri(release_id: &str, n: usize) -> TrackUri {
    TrackUri::new(format!("spotify:track:{release_id}-{n}"))
}

pub fn uris(values: &[&str]) -> Vec<TrackUri> {
    values.iter().map(|v| TrackUri::new(*v)).collect()
}

pub fn date(raw: &str) -> ReleaseDate {
    ReleaseDate::parse(raw).unwrap()
}

/// Config with no politeness delay and a fixed clock.
pub fn test_config() -> ScanConfig {
    let mut config = ScanConfig::new("playlist-1");
    config.unit_delay = Duration::ZERO;
    config.clock = Arc::new(|| Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap());
    config
}

/// State that finished bootstrapping with the given producer watermarks.
pub fn monitoring_state(watermarks: &[(&str, &str)]) -> ScanState {
    let mut state = ScanState::new();
    for (producer, raw) in watermarks {
        state.raise_watermark(producer, &date(raw));
    }
    state.finish_bootstrap();
    state
}

#[derive(Default)]
struct Inner {
    producers: Vec<Producer>,
    releases: HashMap<String, Vec<Release>>,
    tracks: HashMap<String, Vec<Track>>,
    appends: Vec<Vec<TrackUri>>,
    append_attempts: usize,
    throttle_releases: HashMap<String, u64>,
    fail_releases: HashSet<String>,
    throttle_producers_listing: Option<u64>,
    fail_producers_listing: bool,
    fail_append_attempts: HashSet<usize>,
    throttle_append_attempts: HashMap<usize, u64>,
    release_requests: Vec<String>,
}

/// In-memory catalog that records every mutation.
#[derive(Default)]
pub struct FakeCatalog {
    inner: Mutex<Inner>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    pub fn follow(&self, producer_id: &str) {
        self.with(|inner| {
            inner.producers.push(Producer {
                id: producer_id.to_string(),
                name: format!("Artist {producer_id}"),
            })
        });
    }

    pub fn unfollow(&self, producer_id: &str) {
        self.with(|inner| inner.producers.retain(|p| p.id != producer_id));
    }

    pub fn add_release(&self, producer_id: &str, release_id: &str, raw_date: &str, tracks: usize) {
        self.with(|inner| {
            inner
                .releases
                .entry(producer_id.to_string())
                .or_default()
                .push(Release {
                    id: release_id.to_string(),
                    name: format!("Release {release_id}"),
                    kind: ReleaseKind::Album,
                    release_date: date(raw_date),
                });
            inner.tracks.insert(
                release_id.to_string(),
                (0..tracks)
                    .map(|n| Track {
                        id: format!("{release_id}-{n}"),
                        uri: track_uri(release_id, n),
                    })
                    .collect(),
            );
        });
    }

    pub fn throttle_releases_once(&self, producer_id: &str, retry_after_seconds: u64) {
        self.with(|inner| {
            inner
                .throttle_releases
                .insert(producer_id.to_string(), retry_after_seconds)
        });
    }

    pub fn fail_releases(&self, producer_id: &str) {
        self.with(|inner| inner.fail_releases.insert(producer_id.to_string()));
    }

    pub fn throttle_producer_listing(&self, retry_after_seconds: u64) {
        self.with(|inner| inner.throttle_producers_listing = Some(retry_after_seconds));
    }

    pub fn fail_producer_listing(&self) {
        self.with(|inner| inner.fail_producers_listing = true);
    }

    /// Fails the append attempt with this zero-based index with an HTTP 500.
    pub fn fail_append_attempt(&self, attempt: usize) {
        self.with(|inner| inner.fail_append_attempts.insert(attempt));
    }

    pub fn throttle_append_attempt(&self, attempt: usize, retry_after_seconds: u64) {
        self.with(|inner| {
            inner
                .throttle_append_attempts
                .insert(attempt, retry_after_seconds)
        });
    }

    /// Successful append calls, in order.
    pub fn append_calls(&self) -> Vec<Vec<TrackUri>> {
        self.with(|inner| inner.appends.clone())
    }

    pub fn appended(&self) -> Vec<TrackUri> {
        self.append_calls().into_iter().flatten().collect()
    }

    pub fn release_requests(&self) -> Vec<String> {
        self.with(|inner| inner.release_requests.clone())
    }
}

#[async_trait::async_trait]
impl CatalogClient for FakeCatalog {
    async fn list_followed_producers(&self) -> Result<Vec<Producer>, CatalogError> {
        self.with(|inner| {
            if let Some(seconds) = inner.throttle_producers_listing.take() {
                return Err(CatalogError::throttled(seconds));
            }
            if inner.fail_producers_listing {
                return Err(CatalogError::new(CatalogErrorKind::HttpStatus(503), "down"));
            }
            Ok(inner.producers.clone())
        })
    }

    async fn list_releases(
        &self,
        producer_id: &str,
        _kinds: &[ReleaseKind],
        limit: usize,
    ) -> Result<Vec<Release>, CatalogError> {
        self.with(|inner| {
            inner.release_requests.push(producer_id.to_string());
            if let Some(seconds) = inner.throttle_releases.remove(producer_id) {
                return Err(CatalogError::throttled(seconds));
            }
            if inner.fail_releases.contains(producer_id) {
                return Err(CatalogError::new(
                    CatalogErrorKind::HttpStatus(500),
                    "server error",
                ));
            }
            Ok(inner
                .releases
                .get(producer_id)
                .map(|releases| releases.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        })
    }

    async fn list_tracks(&self, release_id: &str, limit: usize) -> Result<Vec<Track>, CatalogError> {
        self.with(|inner| {
            Ok(inner
                .tracks
                .get(release_id)
                .map(|tracks| tracks.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        })
    }

    async fn append_tracks(
        &self,
        collection_id: &str,
        uris: &[TrackUri],
    ) -> Result<(), CatalogError> {
        assert_eq!(collection_id, "playlist-1");
        assert!(uris.len() <= radar_engine::APPEND_BATCH_LIMIT);
        self.with(|inner| {
            let attempt = inner.append_attempts;
            inner.append_attempts += 1;
            if let Some(seconds) = inner.throttle_append_attempts.remove(&attempt) {
                return Err(CatalogError::throttled(seconds));
            }
            if inner.fail_append_attempts.contains(&attempt) {
                return Err(CatalogError::new(
                    CatalogErrorKind::HttpStatus(500),
                    "append failed",
                ));
            }
            inner.appends.push(uris.to_vec());
            Ok(())
        })
    }
}

/// State store kept in memory, counting saves.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<ScanState>>,
    saves: Mutex<usize>,
    broken: bool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_state(state: ScanState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Some(state)),
            ..Self::default()
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            broken: true,
            ..Self::default()
        })
    }

    pub fn current(&self) -> ScanState {
        self.state.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<ScanState, PersistError> {
        if self.broken {
            return Err(PersistError::Corrupt {
                path: PathBuf::from("memory"),
                reason: "unreadable".to_string(),
            });
        }
        Ok(self.current())
    }

    fn save(&self, state: &ScanState) -> Result<(), PersistError> {
        *self.state.lock().unwrap() = Some(state.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}
