//! Core functionality for the kick counter.
//!
//! This module contains:
//! - Session records, daily aggregates and weekly trend summaries
//! - The session tracker state machine

pub mod session;
pub mod tracker;

// Re-export commonly used types
pub use session::{
    duration_note, format_elapsed, parse_duration_note, DailyAggregate, PersistedSession,
    TrendSummary, WeeklyChart,
};
pub use tracker::{
    Notice, SessionSnapshot, SessionTracker, StopOutcome, TrackerError, TrackerSettings,
    TrackerStatus, TICK_INTERVAL,
};
