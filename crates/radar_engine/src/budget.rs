use std::time::Duration;

use radar_logging::radar_warn;

use crate::catalog::{APPEND_BATCH_LIMIT, PRODUCER_PAGE_CAP, RELEASE_PAGE_CAP, TRACK_PAGE_CAP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    FollowedProducers,
    Releases,
    Tracks,
    AppendTracks,
}

impl Endpoint {
    fn page_cap(self) -> usize {
        match self {
            Endpoint::FollowedProducers => PRODUCER_PAGE_CAP,
            Endpoint::Releases => RELEASE_PAGE_CAP,
            Endpoint::Tracks => TRACK_PAGE_CAP,
            Endpoint::AppendTracks => APPEND_BATCH_LIMIT,
        }
    }
}

/// Estimated budget units charged per request, by endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostModel {
    pub followed_producers: u32,
    pub releases: u32,
    pub tracks: u32,
    pub append_tracks: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            followed_producers: 1,
            releases: 2,
            tracks: 1,
            append_tracks: 2,
        }
    }
}

impl CostModel {
    pub fn per_request(&self, endpoint: Endpoint) -> u32 {
        match endpoint {
            Endpoint::FollowedProducers => self.followed_producers,
            Endpoint::Releases => self.releases,
            Endpoint::Tracks => self.tracks,
            Endpoint::AppendTracks => self.append_tracks,
        }
    }

    /// Cost of a facade call that returned `items` records; at least one page.
    pub fn estimate(&self, endpoint: Endpoint, items: usize) -> u32 {
        let pages = items.div_ceil(endpoint.page_cap()).max(1);
        self.per_request(endpoint)
            .saturating_mul(u32::try_from(pages).unwrap_or(u32::MAX))
    }
}

/// Per-run request accounting against a soft ceiling.
#[derive(Debug, Clone)]
pub struct RateBudget {
    spent: u32,
    ceiling: u32,
    throttle_margin: Duration,
}

impl RateBudget {
    pub fn new(ceiling: u32, throttle_margin: Duration) -> Self {
        Self {
            spent: 0,
            ceiling,
            throttle_margin,
        }
    }

    /// Records `cost` units and reports whether the run is still under the ceiling.
    pub fn reserve(&mut self, cost: u32) -> bool {
        self.spent = self.spent.saturating_add(cost);
        self.spent < self.ceiling
    }

    pub fn spent(&self) -> u32 {
        self.spent
    }

    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.spent)
    }

    pub fn is_exhausted(&self) -> bool {
        self.spent >= self.ceiling
    }

    /// Backs off for the server-specified delay plus the safety margin.
    pub async fn observe_throttle(&self, retry_after_seconds: u64) {
        let wait = Duration::from_secs(retry_after_seconds) + self.throttle_margin;
        radar_warn!(
            "Remote throttled the run; backing off for {}s",
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;
    }
}
