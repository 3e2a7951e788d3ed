//! Session records and derived daily/weekly views.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Prefix of the note stored with every session this crate creates.
pub const DURATION_NOTE_PREFIX: &str = "Duration: ";

/// A completed session as owned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// Kicks recorded during the session
    pub kicks: u32,
    /// Session length, when known
    pub duration_secs: Option<u64>,
    /// Server-assigned creation time
    pub timestamp: DateTime<Utc>,
    /// Free-form note stored with the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PersistedSession {
    /// Build a session record from what the store returned.
    ///
    /// The duration is recovered from the note when it carries one.
    pub fn from_store(kicks: u32, timestamp: DateTime<Utc>, notes: Option<String>) -> Self {
        let duration_secs = notes.as_deref().and_then(parse_duration_note);
        Self {
            kicks,
            duration_secs,
            timestamp,
            notes,
        }
    }

    /// Calendar date of the session in `tz`.
    pub fn local_date(&self, tz: Tz) -> NaiveDate {
        self.timestamp.with_timezone(&tz).date_naive()
    }
}

/// Chart data for the trend view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyChart {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl WeeklyChart {
    /// Summary statistics over the chart values.
    ///
    /// Returns `None` for an empty chart.
    pub fn summary(&self) -> Option<TrendSummary> {
        if self.values.is_empty() {
            return None;
        }

        let std_dev = if self.values.len() > 1 {
            self.values.iter().std_dev()
        } else {
            0.0
        };

        Some(TrendSummary {
            days: self.values.len(),
            mean: self.values.iter().mean(),
            min: Statistics::min(self.values.iter()),
            max: Statistics::max(self.values.iter()),
            std_dev,
        })
    }

    /// Label/value pairs, truncated to the shorter of the two.
    pub fn points(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Descriptive statistics of a [`WeeklyChart`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSummary {
    pub days: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Kicks counted for a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyAggregate {
    /// Day the aggregate covers, in the configured time zone
    pub date: NaiveDate,
    /// Number of persisted sessions on that day
    pub sessions: usize,
    /// Kicks from persisted sessions
    pub persisted_kicks: u32,
    /// Kicks of the session currently being tracked
    pub in_progress_kicks: u32,
}

impl DailyAggregate {
    /// Aggregate `sessions` dated `date`, plus any in-progress kicks.
    pub fn compute(
        date: NaiveDate,
        tz: Tz,
        sessions: &[PersistedSession],
        in_progress_kicks: u32,
    ) -> Self {
        let today: Vec<&PersistedSession> = sessions
            .iter()
            .filter(|s| s.local_date(tz) == date)
            .collect();

        Self {
            date,
            sessions: today.len(),
            persisted_kicks: today.iter().map(|s| s.kicks).fold(0, u32::saturating_add),
            in_progress_kicks,
        }
    }

    /// Saturates rather than wrapping on absurd server counts.
    pub fn total(&self) -> u32 {
        self.persisted_kicks.saturating_add(self.in_progress_kicks)
    }
}

/// Format seconds as `HH:MM:SS`; hours are not capped.
pub fn format_elapsed(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Note attached to a session when it is persisted.
pub fn duration_note(secs: u64) -> String {
    format!("{DURATION_NOTE_PREFIX}{}", format_elapsed(secs))
}

/// Recover the duration from a note written by [`duration_note`].
pub fn parse_duration_note(note: &str) -> Option<u64> {
    let clock = note.trim().strip_prefix(DURATION_NOTE_PREFIX)?;
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)
}
