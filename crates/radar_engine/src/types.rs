use std::fmt;

use radar_core::TrackUri;

use crate::PersistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogError {
    pub kind: CatalogErrorKind,
    pub message: String,
}

impl CatalogError {
    pub fn new(kind: CatalogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn throttled(retry_after_seconds: u64) -> Self {
        Self::new(
            CatalogErrorKind::Throttled {
                retry_after_seconds,
            },
            "request throttled",
        )
    }

    /// Seconds the remote asked us to wait; `None` for anything but a hard throttle.
    pub fn retry_after(&self) -> Option<u64> {
        match self.kind {
            CatalogErrorKind::Throttled {
                retry_after_seconds,
            } => Some(retry_after_seconds),
            _ => None,
        }
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CatalogError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogErrorKind {
    Throttled { retry_after_seconds: u64 },
    HttpStatus(u16),
    Unauthorized,
    Timeout,
    Network,
    Decode,
    InvalidRequest,
}

impl fmt::Display for CatalogErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogErrorKind::Throttled {
                retry_after_seconds,
            } => write!(f, "throttled, retry after {retry_after_seconds}s"),
            CatalogErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            CatalogErrorKind::Unauthorized => write!(f, "unauthorized"),
            CatalogErrorKind::Timeout => write!(f, "timeout"),
            CatalogErrorKind::Network => write!(f, "network error"),
            CatalogErrorKind::Decode => write!(f, "malformed response"),
            CatalogErrorKind::InvalidRequest => write!(f, "invalid request"),
        }
    }
}

/// Errors that end a run without producing an outcome.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan state unavailable: {0}")]
    Persistence(#[from] PersistError),
    #[error("listing followed producers failed: {0}")]
    Catalog(CatalogError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub index: usize,
    pub error: CatalogError,
}

/// What happened to each chunk of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadReport {
    /// URIs from chunks the remote accepted.
    pub uploaded: Vec<TrackUri>,
    pub failed: Vec<ChunkFailure>,
    /// Chunks never sent because a throttle stopped the upload.
    pub not_attempted: Vec<usize>,
    pub throttle: Option<u64>,
    pub chunks_sent: usize,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.not_attempted.is_empty()
    }

    /// Indices of every chunk that did not land.
    pub fn failed_chunk_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .failed
            .iter()
            .map(|failure| failure.index)
            .chain(self.not_attempted.iter().copied())
            .collect();
        indices.sort_unstable();
        indices
    }
}
