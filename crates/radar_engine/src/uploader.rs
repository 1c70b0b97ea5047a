use std::collections::HashSet;

use radar_core::TrackUri;
use radar_logging::{radar_debug, radar_warn};

use crate::catalog::{CatalogClient, APPEND_BATCH_LIMIT};
use crate::{ChunkFailure, UploadReport};

/// Appends tracks to a collection in chunks the remote accepts.
///
/// Never retries: a failed chunk is reported and the next chunk is sent. A
/// throttle stops the upload and the remaining chunks are reported as not attempted.
pub struct TrackUploader<'a> {
    catalog: &'a dyn CatalogClient,
    batch_limit: usize,
}

impl<'a> TrackUploader<'a> {
    pub fn new(catalog: &'a dyn CatalogClient) -> Self {
        Self::with_batch_limit(catalog, APPEND_BATCH_LIMIT)
    }

    pub fn with_batch_limit(catalog: &'a dyn CatalogClient, batch_limit: usize) -> Self {
        Self {
            catalog,
            batch_limit: batch_limit.clamp(1, APPEND_BATCH_LIMIT),
        }
    }

    pub async fn upload(&self, collection_id: &str, uris: &[TrackUri]) -> UploadReport {
        let unique = dedupe(uris);
        let chunks: Vec<&[TrackUri]> = unique.chunks(self.batch_limit).collect();
        let mut report = UploadReport::default();

        for (index, chunk) in chunks.iter().enumerate() {
            if report.throttle.is_some() {
                report.not_attempted.push(index);
                continue;
            }
            report.chunks_sent += 1;
            match self.catalog.append_tracks(collection_id, chunk).await {
                Ok(()) => {
                    radar_debug!(
                        "Appended chunk {} ({} tracks) to {}",
                        index,
                        chunk.len(),
                        collection_id
                    );
                    report.uploaded.extend(chunk.iter().cloned());
                }
                Err(error) => {
                    radar_warn!("Chunk {} of {} failed: {}", index, chunks.len(), error);
                    report.throttle = error.retry_after();
                    report.failed.push(ChunkFailure { index, error });
                }
            }
        }
        report
    }
}

/// Collapses duplicates, keeping first-seen order so chunk contents are deterministic.
fn dedupe(uris: &[TrackUri]) -> Vec<TrackUri> {
    let mut seen = HashSet::with_capacity(uris.len());
    uris.iter()
        .filter(|uri| seen.insert(*uri))
        .cloned()
        .collect()
}
