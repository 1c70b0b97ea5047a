use std::collections::{BTreeMap, HashSet};

use crate::{Release, ReleaseDate, ScanState, TrackUri};

/// A release found newer than its producer's watermark, with the tracks that
/// must land in the collection before the watermark may pass it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRelease {
    pub producer_id: String,
    pub release: Release,
    pub tracks: Vec<TrackUri>,
}

impl DiscoveredRelease {
    fn landed(&self, landed: &HashSet<TrackUri>) -> bool {
        self.tracks.iter().all(|uri| landed.contains(uri))
    }
}

/// Release with the greatest date; on ties the first one in fetch order wins.
pub fn select_latest(releases: &[Release]) -> Option<&Release> {
    releases.iter().fold(None, |best: Option<&Release>, candidate| match best {
        Some(current) if current.release_date >= candidate.release_date => Some(current),
        _ => Some(candidate),
    })
}

/// Releases strictly newer than `watermark`, in fetch order.
pub fn newer_than<'a>(
    releases: &'a [Release],
    watermark: &'a ReleaseDate,
) -> impl Iterator<Item = &'a Release> + 'a {
    releases
        .iter()
        .filter(move |release| release.release_date > *watermark)
}

/// Advances watermarks for releases whose tracks all landed.
///
/// Per producer the watermark stops strictly below the earliest release that did
/// not land, so that release is rediscovered next run. Returns the number of
/// producers whose watermark moved.
pub fn commit_discoveries(
    state: &mut ScanState,
    discoveries: &[DiscoveredRelease],
    landed: &HashSet<TrackUri>,
) -> usize {
    let mut by_producer: BTreeMap<&str, Vec<&DiscoveredRelease>> = BTreeMap::new();
    for discovery in discoveries {
        by_producer
            .entry(discovery.producer_id.as_str())
            .or_default()
            .push(discovery);
    }

    let mut advanced = 0;
    for (producer_id, releases) in by_producer {
        let earliest_missing = releases
            .iter()
            .filter(|d| !d.landed(landed))
            .map(|d| &d.release.release_date)
            .min();
        let target = releases
            .iter()
            .filter(|d| d.landed(landed))
            .map(|d| &d.release.release_date)
            .filter(|date| earliest_missing.is_none_or(|missing| *date < missing))
            .max()
            .cloned();
        if let Some(date) = target {
            if state.raise_watermark(producer_id, &date) {
                advanced += 1;
            }
        }
    }
    advanced
}
