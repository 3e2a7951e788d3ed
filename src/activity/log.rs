//! Running tally of what the tracker did, kept in a JSON file between runs.

use crate::core::StopOutcome;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Something the tracker did that is worth counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    SessionStarted,
    Kick,
    /// A stopped session reached the store
    SessionSaved { kicks: u32 },
    /// A stopped session had no kicks and was dropped locally
    SessionDiscarded,
    /// The store rejected the session; its kicks are gone
    SaveFailed { kicks: u32 },
}

impl From<&StopOutcome> for Activity {
    fn from(outcome: &StopOutcome) -> Self {
        match outcome {
            StopOutcome::Discarded { .. } => Activity::SessionDiscarded,
            StopOutcome::Saved { session, .. } => Activity::SessionSaved {
                kicks: session.kicks,
            },
        }
    }
}

/// Cumulative counters. This is also the on-disk format; missing fields
/// read as zero so older files keep loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityStats {
    pub sessions_started: u64,
    pub kicks_recorded: u64,
    pub sessions_saved: u64,
    pub kicks_saved: u64,
    pub sessions_discarded: u64,
    pub saves_failed: u64,
    pub kicks_lost: u64,
}

impl ActivityStats {
    pub fn apply(&mut self, activity: Activity) {
        match activity {
            Activity::SessionStarted => self.sessions_started += 1,
            Activity::Kick => self.kicks_recorded += 1,
            Activity::SessionSaved { kicks } => {
                self.sessions_saved += 1;
                self.kicks_saved += u64::from(kicks);
            }
            Activity::SessionDiscarded => self.sessions_discarded += 1,
            Activity::SaveFailed { kicks } => {
                self.saves_failed += 1;
                self.kicks_lost += u64::from(kicks);
            }
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Activity:\n\
             - Sessions started: {}\n\
             - Kicks recorded: {}\n\
             - Sessions saved: {} ({} kicks)\n\
             - Sessions without kicks (not saved): {}\n\
             - Failed saves: {}",
            self.sessions_started,
            self.kicks_recorded,
            self.sessions_saved,
            self.kicks_saved,
            self.sessions_discarded,
            self.saves_failed
        );

        if self.saves_failed > 0 {
            summary.push_str(&format!(
                "\n\n{} kicks from {} session(s) could not be saved and were not stored. \
                 Log them again if they matter to your care team.",
                self.kicks_lost, self.saves_failed
            ));
        }

        summary
    }
}

/// Activity counters, optionally backed by a file.
#[derive(Debug, Default)]
pub struct ActivityLog {
    stats: Mutex<ActivityStats>,
    path: Option<PathBuf>,
}

/// Activity log shared between the tracker and the CLI.
pub type SharedActivityLog = Arc<ActivityLog>;

impl ActivityLog {
    /// Counters that live only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Empty counters that [`save`](Self::save) writes to `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            stats: Mutex::default(),
            path: Some(path.into()),
        }
    }

    /// Counters loaded from `path`; a missing file starts from zero.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let path = path.into();
        let stats = if path.exists() {
            read_stats(&path)?
        } else {
            ActivityStats::default()
        };
        Ok(Self {
            stats: Mutex::new(stats),
            path: Some(path),
        })
    }

    pub fn record(&self, activity: Activity) {
        self.lock().apply(activity);
    }

    pub fn stats(&self) -> ActivityStats {
        self.lock().clone()
    }

    pub fn summary(&self) -> String {
        self.lock().summary()
    }

    /// Write the counters out. Does nothing for an in-memory log.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.stats()).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    fn lock(&self) -> MutexGuard<'_, ActivityStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_stats(path: &Path) -> Result<ActivityStats, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
