use std::sync::Arc;

use radar_core::{Producer, Release, ReleaseKind, Track, TrackUri};

use crate::CatalogError;

/// Most URIs the append endpoint accepts per call.
pub const APPEND_BATCH_LIMIT: usize = 50;
/// Page caps of the listing endpoints.
pub const PRODUCER_PAGE_CAP: usize = 50;
pub const RELEASE_PAGE_CAP: usize = 50;
pub const TRACK_PAGE_CAP: usize = 50;

/// Typed facade over the remote listing and mutation API.
///
/// Implementations exhaust pagination internally and validate every record
/// before returning it.
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Every followed producer, in remote order (not stable across calls).
    async fn list_followed_producers(&self) -> Result<Vec<Producer>, CatalogError>;

    /// Up to `limit` releases of each requested kind. Order is unspecified.
    async fn list_releases(
        &self,
        producer_id: &str,
        kinds: &[ReleaseKind],
        limit: usize,
    ) -> Result<Vec<Release>, CatalogError>;

    async fn list_tracks(&self, release_id: &str, limit: usize)
        -> Result<Vec<Track>, CatalogError>;

    /// Appends at most [`APPEND_BATCH_LIMIT`] tracks to a collection.
    async fn append_tracks(
        &self,
        collection_id: &str,
        uris: &[TrackUri],
    ) -> Result<(), CatalogError>;
}

#[async_trait::async_trait]
impl<T: CatalogClient + ?Sized> CatalogClient for Arc<T> {
    async fn list_followed_producers(&self) -> Result<Vec<Producer>, CatalogError> {
        (**self).list_followed_producers().await
    }

    async fn list_releases(
        &self,
        producer_id: &str,
        kinds: &[ReleaseKind],
        limit: usize,
    ) -> Result<Vec<Release>, CatalogError> {
        (**self).list_releases(producer_id, kinds, limit).await
    }

    async fn list_tracks(
        &self,
        release_id: &str,
        limit: usize,
    ) -> Result<Vec<Track>, CatalogError> {
        (**self).list_tracks(release_id, limit).await
    }

    async fn append_tracks(
        &self,
        collection_id: &str,
        uris: &[TrackUri],
    ) -> Result<(), CatalogError> {
        (**self).append_tracks(collection_id, uris).await
    }
}
