use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use radar_core::{
    commit_discoveries, newer_than, select_latest, DiscoveredRelease, Phase, Producer, Release,
    ReleaseDate, ReleaseKind, RunOutcome, RunReport, ScanState, Track, TrackUri,
};
use radar_logging::{radar_debug, radar_info, radar_warn};

use crate::budget::{CostModel, Endpoint, RateBudget};
use crate::catalog::CatalogClient;
use crate::persist::StateStore;
use crate::uploader::TrackUploader;
use crate::{CatalogError, ScanError, UploadReport};

/// Track limit meaning "every track of the release".
pub const ALL_TRACKS: usize = usize::MAX;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct ScanConfig {
    /// Collection new tracks are appended to.
    pub collection_id: String,
    /// Soft ceiling on budget units spent per run.
    pub budget_ceiling: u32,
    pub costs: CostModel,
    /// Added to the server's retry-after on a hard throttle.
    pub throttle_margin: Duration,
    /// Politeness interval between producers.
    pub unit_delay: Duration,
    pub bootstrap_release_limit: usize,
    pub monitor_release_limit: usize,
    /// Skip monitoring runs when one already completed today (UTC).
    pub once_per_day: bool,
    pub clock: Clock,
}

impl ScanConfig {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            budget_ceiling: 95,
            costs: CostModel::default(),
            throttle_margin: Duration::from_secs(5),
            unit_delay: Duration::from_millis(500),
            bootstrap_release_limit: 20,
            monitor_release_limit: 5,
            once_per_day: false,
            clock: Arc::new(Utc::now),
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("collection_id", &self.collection_id)
            .field("budget_ceiling", &self.budget_ceiling)
            .field("costs", &self.costs)
            .field("throttle_margin", &self.throttle_margin)
            .field("unit_delay", &self.unit_delay)
            .field("bootstrap_release_limit", &self.bootstrap_release_limit)
            .field("monitor_release_limit", &self.monitor_release_limit)
            .field("once_per_day", &self.once_per_day)
            .finish_non_exhaustive()
    }
}

struct Seed {
    release_date: ReleaseDate,
    tracks_added: usize,
}

/// Resumable two-phase scanner. Exclusive access (`&mut self`) serialises runs.
pub struct ScanEngine<C, S> {
    catalog: C,
    store: S,
    config: ScanConfig,
}

impl<C: CatalogClient, S: StateStore> ScanEngine<C, S> {
    pub fn new(catalog: C, store: S, config: ScanConfig) -> Self {
        Self {
            catalog,
            store,
            config,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Performs one bounded scan and returns how it ended.
    ///
    /// Throttles and per-producer failures are absorbed into the outcome; only an
    /// unusable state store or a failed producer listing surface as errors.
    pub async fn run_once(&mut self) -> Result<RunOutcome, ScanError> {
        let _run = radar_logging::begin_run();
        let mut state = self.store.load()?;
        let now = (self.config.clock)();

        if self.config.once_per_day
            && state.phase() == Phase::Monitoring
            && state.ran_on_same_day(now)
        {
            radar_info!("Monitoring already completed today; skipping");
            return Ok(RunOutcome::SkippedAlreadyRanToday);
        }

        let mut budget = RateBudget::new(self.config.budget_ceiling, self.config.throttle_margin);
        let producers = match self.followed_producers(&mut budget).await {
            Ok(producers) => producers,
            Err(error) => {
                return match error.retry_after() {
                    Some(seconds) => {
                        budget.observe_throttle(seconds).await;
                        Ok(RunOutcome::RateLimited(RunReport::new(state.phase())))
                    }
                    None => Err(ScanError::Catalog(error)),
                };
            }
        };
        radar_info!(
            "{:?} pass over {} followed producers",
            state.phase(),
            producers.len()
        );

        let outcome = match state.phase() {
            Phase::Bootstrapping => {
                self.bootstrap(&mut state, &producers, &mut budget, now)
                    .await?
            }
            Phase::Monitoring => self.monitor(&mut state, &producers, &mut budget, now).await?,
        };
        radar_info!(
            "Run {}; {} budget units spent",
            outcome,
            budget.spent()
        );
        Ok(outcome)
    }

    async fn bootstrap(
        &self,
        state: &mut ScanState,
        producers: &[Producer],
        budget: &mut RateBudget,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, ScanError> {
        let mut report = RunReport::new(Phase::Bootstrapping);
        state.clamp_cursor(producers.len());
        let start = state.cursor();
        if start > 0 {
            radar_info!("Resuming bootstrap at producer {}", start);
        }

        for (index, producer) in producers.iter().enumerate().skip(start) {
            if budget.is_exhausted() {
                radar_info!("Request budget spent; {} producers left", producers.len() - index);
                report.budget_exhausted = true;
                break;
            }
            self.pause_between_units(report.producers_scanned).await;

            match self.seed_producer(producer, budget).await {
                Ok(Some(seed)) => {
                    state.raise_watermark(&producer.id, &seed.release_date);
                    report.tracks_added += seed.tracks_added;
                }
                Ok(None) => radar_debug!("{} has nothing to seed", producer.name),
                Err(error) => match error.retry_after() {
                    Some(seconds) => {
                        // Cursor stays on this producer; earlier units are already saved.
                        budget.observe_throttle(seconds).await;
                        return Ok(RunOutcome::RateLimited(report));
                    }
                    None => radar_warn!(
                        "Skipping {} ({}) this pass: {}",
                        producer.name,
                        producer.id,
                        error
                    ),
                },
            }

            state.advance_cursor();
            self.store.save(state)?;
            report.producers_scanned += 1;
            radar_debug!("[{}/{}] {}", index + 1, producers.len(), producer.name);
        }

        if !report.budget_exhausted {
            state.finish_bootstrap();
            radar_info!("Bootstrap finished; monitoring from now on");
        }
        state.mark_run(now);
        self.store.save(state)?;
        Ok(RunOutcome::Completed(report))
    }

    async fn seed_producer(
        &self,
        producer: &Producer,
        budget: &mut RateBudget,
    ) -> Result<Option<Seed>, CatalogError> {
        let releases = self
            .releases(&producer.id, self.config.bootstrap_release_limit, budget)
            .await?;
        let Some(latest) = select_latest(&releases) else {
            return Ok(None);
        };

        let tracks = self.tracks(&latest.id, 1, budget).await?;
        let Some(track) = tracks.into_iter().next() else {
            return Ok(Some(Seed {
                release_date: latest.release_date.clone(),
                tracks_added: 0,
            }));
        };

        let upload = self.upload(std::slice::from_ref(&track.uri), budget).await;
        if let Some(failure) = upload.failed.into_iter().next() {
            return Err(failure.error);
        }
        radar_info!(
            "Seeded {} with \"{}\" ({})",
            producer.name,
            latest.name,
            latest.release_date
        );
        Ok(Some(Seed {
            release_date: latest.release_date.clone(),
            tracks_added: upload.uploaded.len(),
        }))
    }

    async fn monitor(
        &self,
        state: &mut ScanState,
        producers: &[Producer],
        budget: &mut RateBudget,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, ScanError> {
        let mut report = RunReport::new(Phase::Monitoring);
        let mut discoveries = Vec::new();
        let mut throttled = false;

        for (index, producer) in producers.iter().enumerate() {
            if budget.is_exhausted() {
                radar_info!("Request budget spent; {} producers left", producers.len() - index);
                report.budget_exhausted = true;
                break;
            }
            self.pause_between_units(report.producers_scanned).await;

            let watermark = state.comparison_watermark(&producer.id);
            match self.scan_producer(producer, &watermark, budget).await {
                Ok(found) => discoveries.extend(found),
                Err(error) => match error.retry_after() {
                    Some(seconds) => {
                        budget.observe_throttle(seconds).await;
                        throttled = true;
                        break;
                    }
                    None => radar_warn!(
                        "Skipping {} ({}) this pass: {}",
                        producer.name,
                        producer.id,
                        error
                    ),
                },
            }
            report.producers_scanned += 1;
        }

        // Discoveries made before a throttle are still uploaded once the backoff is over.
        let uris: Vec<TrackUri> = discoveries
            .iter()
            .flat_map(|discovery| discovery.tracks.iter().cloned())
            .collect();
        let mut landed = HashSet::new();
        if !uris.is_empty() {
            let upload = self.upload(&uris, budget).await;
            report.tracks_added = upload.uploaded.len();
            report.failed_chunks = upload.failed_chunk_indices();
            if let Some(seconds) = upload.throttle {
                budget.observe_throttle(seconds).await;
                throttled = true;
            }
            landed.extend(upload.uploaded);
        }

        let advanced = commit_discoveries(state, &discoveries, &landed);
        radar_debug!("{} producer watermarks advanced", advanced);
        if !throttled {
            state.mark_run(now);
        }
        self.store.save(state)?;

        Ok(if throttled {
            RunOutcome::RateLimited(report)
        } else {
            RunOutcome::Completed(report)
        })
    }

    async fn scan_producer(
        &self,
        producer: &Producer,
        watermark: &ReleaseDate,
        budget: &mut RateBudget,
    ) -> Result<Vec<DiscoveredRelease>, CatalogError> {
        let releases = self
            .releases(&producer.id, self.config.monitor_release_limit, budget)
            .await?;

        let mut found = Vec::new();
        for release in newer_than(&releases, watermark) {
            let tracks = self.tracks(&release.id, ALL_TRACKS, budget).await?;
            radar_info!(
                "New release: {} - {} ({}, {} tracks)",
                producer.name,
                release.name,
                release.release_date,
                tracks.len()
            );
            found.push(DiscoveredRelease {
                producer_id: producer.id.clone(),
                release: release.clone(),
                tracks: tracks.into_iter().map(|track| track.uri).collect(),
            });
        }
        Ok(found)
    }

    async fn followed_producers(
        &self,
        budget: &mut RateBudget,
    ) -> Result<Vec<Producer>, CatalogError> {
        let result = self.catalog.list_followed_producers().await;
        let returned = result.as_ref().map_or(0, Vec::len);
        budget.reserve(self.config.costs.estimate(Endpoint::FollowedProducers, returned));
        result
    }

    async fn releases(
        &self,
        producer_id: &str,
        limit: usize,
        budget: &mut RateBudget,
    ) -> Result<Vec<Release>, CatalogError> {
        let result = self
            .catalog
            .list_releases(producer_id, &ReleaseKind::TRACKED, limit)
            .await;
        let returned = result.as_ref().map_or(0, Vec::len);
        budget.reserve(self.config.costs.estimate(Endpoint::Releases, returned));
        result
    }

    async fn tracks(
        &self,
        release_id: &str,
        limit: usize,
        budget: &mut RateBudget,
    ) -> Result<Vec<Track>, CatalogError> {
        let result = self.catalog.list_tracks(release_id, limit).await;
        let returned = result.as_ref().map_or(0, Vec::len);
        budget.reserve(self.config.costs.estimate(Endpoint::Tracks, returned));
        result
    }

    async fn upload(&self, uris: &[TrackUri], budget: &mut RateBudget) -> UploadReport {
        let report = TrackUploader::new(&self.catalog)
            .upload(&self.config.collection_id, uris)
            .await;
        let sent = u32::try_from(report.chunks_sent).unwrap_or(u32::MAX);
        budget.reserve(
            self.config
                .costs
                .per_request(Endpoint::AppendTracks)
                .saturating_mul(sent),
        );
        report
    }

    async fn pause_between_units(&self, completed_units: usize) {
        if completed_units > 0 && !self.config.unit_delay.is_zero() {
            tokio::time::sleep(self.config.unit_delay).await;
        }
    }
}
