use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid release date {raw:?}: {reason}")]
pub struct DateError {
    pub raw: String,
    pub reason: &'static str,
}

/// Calendar date of a release, always stored as zero-padded `YYYY-MM-DD`.
///
/// Ordering is plain string ordering, which matches chronological ordering only
/// because every constructor normalises to the fixed-width form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseDate(String);

impl ReleaseDate {
    /// Older than any real release; the initial global watermark.
    pub const SENTINEL: &'static str = "2000-01-01";

    pub fn sentinel() -> Self {
        Self(Self::SENTINEL.to_string())
    }

    /// Parses `YYYY-MM-DD`, `YYYY-MM` or `YYYY`. Reduced precision is padded
    /// with the first month/day so the value stays comparable.
    pub fn parse(raw: &str) -> Result<Self, DateError> {
        let trimmed = raw.trim();
        let padded = match trimmed.len() {
            4 => format!("{trimmed}-01-01"),
            7 => format!("{trimmed}-01"),
            10 => trimmed.to_string(),
            _ => return Err(invalid(raw, "expected YYYY, YYYY-MM or YYYY-MM-DD")),
        };
        let date = NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
            .map_err(|_| invalid(raw, "not a calendar date"))?;
        Ok(Self::from_naive(date))
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == Self::SENTINEL
    }
}

fn invalid(raw: &str, reason: &'static str) -> DateError {
    DateError {
        raw: raw.to_string(),
        reason,
    }
}

impl Default for ReleaseDate {
    fn default() -> Self {
        Self::sentinel()
    }
}

impl FromStr for ReleaseDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReleaseDate {
    type Error = DateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReleaseDate> for String {
    fn from(value: ReleaseDate) -> Self {
        value.0
    }
}

impl fmt::Display for ReleaseDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
