use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, NaiveTime};

/// Fixed wall-clock times at which `watch` triggers a run, every day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    times: Vec<NaiveTime>,
}

impl DailySchedule {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let mut times = entries
            .iter()
            .map(|entry| {
                let raw = entry.as_ref().trim();
                NaiveTime::parse_from_str(raw, "%H:%M")
                    .with_context(|| format!("invalid schedule time {raw:?}, expected HH:MM"))
            })
            .collect::<Result<Vec<_>>>()?;
        if times.is_empty() {
            bail!("schedule needs at least one HH:MM entry");
        }
        times.sort();
        times.dedup();
        Ok(Self { times })
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// First slot strictly after `now`, rolling over to tomorrow's first slot.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        if let Some(slot) = self
            .times
            .iter()
            .map(|time| today.and_time(*time))
            .find(|slot| *slot > now)
        {
            return slot;
        }
        let tomorrow = today.succ_opt().unwrap_or(today);
        tomorrow.and_time(self.times.first().copied().unwrap_or(NaiveTime::MIN))
    }

    /// Wall-clock wait until the next slot. Off by the shift on DST change days.
    pub fn delay_until_next(&self, now: DateTime<Local>) -> Duration {
        let local = now.naive_local();
        (self.next_after(local) - local)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .times
            .iter()
            .map(|time| time.format("%H:%M").to_string())
            .collect();
        f.write_str(&rendered.join(", "))
    }
}
