use std::fmt;

use crate::Phase;

/// Result of one `run_once` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The pass finished, possibly cut short by the request budget.
    Completed(RunReport),
    /// A hard throttle ended the pass after backing off.
    RateLimited(RunReport),
    /// Daily guard: a monitoring run already completed today.
    SkippedAlreadyRanToday,
}

impl RunOutcome {
    pub fn tracks_added(&self) -> usize {
        self.report().map_or(0, |report| report.tracks_added)
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) | RunOutcome::RateLimited(report) => Some(report),
            RunOutcome::SkippedAlreadyRanToday => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub phase: Phase,
    pub producers_scanned: usize,
    pub tracks_added: usize,
    pub budget_exhausted: bool,
    pub failed_chunks: Vec<usize>,
}

impl RunReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            producers_scanned: 0,
            tracks_added: 0,
            budget_exhausted: false,
            failed_chunks: Vec::new(),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} producers scanned, {} tracks added",
            self.phase, self.producers_scanned, self.tracks_added
        )?;
        if self.budget_exhausted {
            write!(f, ", request budget exhausted")?;
        }
        if !self.failed_chunks.is_empty() {
            write!(f, ", failed upload chunks {:?}", self.failed_chunks)?;
        }
        Ok(())
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed(report) => write!(f, "completed ({report})"),
            RunOutcome::RateLimited(report) => write!(f, "rate limited ({report})"),
            RunOutcome::SkippedAlreadyRanToday => write!(f, "skipped, already ran today"),
        }
    }
}
