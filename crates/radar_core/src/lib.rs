//! Radar core: pure scan state machine and domain records.
mod date;
mod model;
mod outcome;
mod state;
mod watermark;

pub use date::{DateError, ReleaseDate};
pub use model::{Producer, Release, ReleaseKind, Track, TrackUri};
pub use outcome::{RunOutcome, RunReport};
pub use state::{Phase, ScanState};
pub use watermark::{commit_discoveries, newer_than, select_latest, DiscoveredRelease};
