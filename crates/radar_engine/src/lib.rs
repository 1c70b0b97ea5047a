//! Radar engine: catalog IO, request budgeting, persistence and the scan loop.
mod auth;
mod budget;
mod catalog;
mod persist;
mod scanner;
mod spotify;
mod types;
mod uploader;

pub use auth::Credentials;
pub use budget::{CostModel, Endpoint, RateBudget};
pub use catalog::{
    CatalogClient, APPEND_BATCH_LIMIT, PRODUCER_PAGE_CAP, RELEASE_PAGE_CAP, TRACK_PAGE_CAP,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, JsonStateStore, PersistError, StateStore};
pub use scanner::{Clock, ScanConfig, ScanEngine, ALL_TRACKS};
pub use spotify::{CatalogSettings, HttpCatalog};
pub use types::{CatalogError, CatalogErrorKind, ChunkFailure, ScanError, UploadReport};
pub use uploader::TrackUploader;
