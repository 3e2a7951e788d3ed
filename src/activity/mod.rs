//! Local activity statistics for the kick counter.
//!
//! Counts what the tracker did (sessions, kicks, saves) so the user can see
//! at a glance whether anything was lost to a failed save.

pub mod log;

pub use log::{Activity, ActivityLog, ActivityStats, SharedActivityLog};
