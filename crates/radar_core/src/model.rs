use std::fmt;

use crate::ReleaseDate;

/// A followed artist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseKind {
    Album,
    Single,
    Other,
}

impl ReleaseKind {
    /// Kinds the scanner asks the catalog for.
    pub const TRACKED: [ReleaseKind; 2] = [ReleaseKind::Album, ReleaseKind::Single];

    pub fn from_api(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "album" => ReleaseKind::Album,
            "single" => ReleaseKind::Single,
            _ => ReleaseKind::Other,
        }
    }

    pub fn as_api_str(self) -> &'static str {
        match self {
            ReleaseKind::Album => "album",
            ReleaseKind::Single => "single",
            ReleaseKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub id: String,
    pub name: String,
    pub kind: ReleaseKind,
    pub release_date: ReleaseDate,
}

/// Catalog URI of a track, the unit appended to a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackUri(String);

impl TrackUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub uri: TrackUri,
}
