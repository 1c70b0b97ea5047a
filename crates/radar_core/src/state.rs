use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ReleaseDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// One-time pass seeding a watermark per producer.
    #[default]
    Bootstrapping,
    /// Steady state: only releases newer than the recorded watermarks.
    Monitoring,
}

/// Durable scan progress. Read and written as a single unit.
///
/// Watermarks only move forward; every mutator enforces that.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanState {
    phase: Phase,
    cursor: usize,
    global_watermark: ReleaseDate,
    #[serde(default)]
    per_producer_watermark: BTreeMap<String, ReleaseDate>,
    #[serde(default)]
    last_run_timestamp: Option<i64>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn global_watermark(&self) -> &ReleaseDate {
        &self.global_watermark
    }

    pub fn producer_watermark(&self, producer_id: &str) -> Option<&ReleaseDate> {
        self.per_producer_watermark.get(producer_id)
    }

    pub fn producer_watermarks(&self) -> &BTreeMap<String, ReleaseDate> {
        &self.per_producer_watermark
    }

    pub fn last_run_timestamp(&self) -> Option<i64> {
        self.last_run_timestamp
    }

    /// Watermark a producer's releases are compared against while monitoring:
    /// its own entry, or the sentinel for producers never ingested.
    pub fn comparison_watermark(&self, producer_id: &str) -> ReleaseDate {
        self.per_producer_watermark
            .get(producer_id)
            .cloned()
            .unwrap_or_else(ReleaseDate::sentinel)
    }

    /// Keeps the cursor inside `[0, producer_count]` after the follow list shrank.
    pub fn clamp_cursor(&mut self, producer_count: usize) {
        if self.cursor > producer_count {
            self.cursor = producer_count;
        }
    }

    pub fn advance_cursor(&mut self) {
        self.cursor += 1;
    }

    /// Raises both the producer's and the global watermark to `date`.
    /// Returns false when the producer watermark was already at or past it.
    pub fn raise_watermark(&mut self, producer_id: &str, date: &ReleaseDate) -> bool {
        if *date > self.global_watermark {
            self.global_watermark = date.clone();
        }
        match self.per_producer_watermark.get_mut(producer_id) {
            Some(current) if *current >= *date => false,
            Some(current) => {
                *current = date.clone();
                true
            }
            None => {
                self.per_producer_watermark
                    .insert(producer_id.to_string(), date.clone());
                true
            }
        }
    }

    /// BOOTSTRAPPING -> MONITORING. Irreversible; the cursor is meaningless afterwards.
    pub fn finish_bootstrap(&mut self) {
        self.phase = Phase::Monitoring;
        self.cursor = 0;
    }

    pub fn mark_run(&mut self, now: DateTime<Utc>) {
        self.last_run_timestamp = Some(now.timestamp());
    }

    /// True when a completed run was recorded on the same UTC calendar day as `now`.
    pub fn ran_on_same_day(&self, now: DateTime<Utc>) -> bool {
        self.last_run_timestamp
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .is_some_and(|last| last.date_naive() == now.date_naive())
    }
}
