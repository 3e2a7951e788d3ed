//! Kick-count session tracker.
//!
//! Two states, Idle and Tracking, plus a transient Saving state while a
//! stopped session is being persisted:
//!
//! ```text
//!            start()                 stop(), kicks > 0
//!   Idle ─────────────▶ Tracking ─────────────────────▶ Saving
//!    ▲                     │                               │
//!    │  stop(), no kicks   │                               │ success / failure
//!    ├─────────────────────┘                               │
//!    └─────────────────────────────────────────────────────┘
//! ```
//!
//! Elapsed time comes from a one-second tick owned by the active session.
//! The tick handle is dropped whenever the session ends, so no timer
//! outlives the Tracking state.

use crate::activity::{Activity, SharedActivityLog};
use crate::clock::{Clock, TickHandle};
use crate::core::session::{duration_note, DailyAggregate, PersistedSession, WeeklyChart};
use crate::store::{SessionStore, StoreError};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Tick period; each tick adds one second of elapsed time.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Days of history read by [`SessionTracker::fetch_today_sessions`].
pub const TODAY_DAYS: u32 = 1;

/// Days of history read by [`SessionTracker::fetch_weekly_trend`].
pub const TREND_DAYS: u32 = 7;

/// Thresholds and bounds the tracker runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub goal_kicks: u32,
    pub low_kick_threshold: u32,
    pub low_kick_window: Duration,
    pub request_timeout: Duration,
    pub timezone: Tz,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            goal_kicks: 10,
            low_kick_threshold: 6,
            low_kick_window: Duration::from_secs(2 * 60 * 60),
            request_timeout: Duration::from_secs(10),
            timezone: chrono_tz::UTC,
        }
    }
}

/// Where the tracker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Idle,
    Tracking,
    /// A stopped session is being persisted
    Saving,
}

impl std::fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerStatus::Idle => write!(f, "idle"),
            TrackerStatus::Tracking => write!(f, "tracking"),
            TrackerStatus::Saving => write!(f, "saving"),
        }
    }
}

/// Informational notices surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The session reached the kick goal. Tracking continues.
    GoalReached { kicks: u32 },
    /// Few kicks over a long session; worth a call to the care team.
    LowKickCount { kicks: u32, elapsed_secs: u64 },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::GoalReached { kicks } => {
                write!(f, "Goal reached: {kicks} kicks recorded in this session")
            }
            Notice::LowKickCount { kicks, elapsed_secs } => write!(
                f,
                "Only {kicks} kicks in {} minutes. Consider contacting your healthcare provider.",
                elapsed_secs / 60
            ),
        }
    }
}

/// Result of a successful [`SessionTracker::stop`].
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// No kicks were recorded; nothing was sent to the store
    Discarded { elapsed_secs: u64 },
    /// The session was persisted
    Saved {
        session: PersistedSession,
        advisory: Option<Notice>,
    },
}

/// Point-in-time view of the tracker for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: TrackerStatus,
    pub kick_count: u32,
    pub elapsed_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
}

/// Tracker error types.
#[derive(Debug)]
pub enum TrackerError {
    /// The operation needs an active session
    NotTracking,
    /// A session is already running
    AlreadyTracking,
    /// A stopped session is still being saved
    SaveInProgress,
    /// The store did not answer in time
    Timeout(Duration),
    /// The store rejected the request
    Store(StoreError),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::NotTracking => write!(f, "No session is being tracked"),
            TrackerError::AlreadyTracking => write!(f, "A session is already being tracked"),
            TrackerError::SaveInProgress => write!(f, "The previous session is still being saved"),
            TrackerError::Timeout(after) => {
                write!(f, "Request timed out after {}s", after.as_secs())
            }
            TrackerError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackerError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for TrackerError {
    fn from(e: StoreError) -> Self {
        TrackerError::Store(e)
    }
}

/// The session being tracked right now.
struct ActiveSession {
    id: Uuid,
    kick_count: u32,
    started_at: DateTime<Utc>,
    elapsed: Arc<AtomicU64>,
    goal_notified: bool,
    _ticker: TickHandle,
}

impl ActiveSession {
    fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::SeqCst)
    }
}

/// A session taken out of Tracking, on its way to the store.
struct FinishedSession {
    id: Uuid,
    kicks: u32,
    elapsed_secs: u64,
}

struct TrackerInner {
    status: TrackerStatus,
    active: Option<ActiveSession>,
    today: Vec<PersistedSession>,
    /// Sessions this tracker saved, kept until a fetch returns them
    saved: Vec<PersistedSession>,
    weekly: Option<WeeklyChart>,
}

/// Turns taps into persisted kick-count sessions.
///
/// All methods take `&self`; state sits behind a mutex that is never held
/// across an `.await`, so a UI can keep reading the snapshot while a save is
/// in flight.
pub struct SessionTracker {
    clock: Arc<dyn Clock>,
    store: Arc<dyn SessionStore>,
    settings: TrackerSettings,
    activity: Option<SharedActivityLog>,
    inner: Mutex<TrackerInner>,
}

impl SessionTracker {
    /// Create an idle tracker.
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn SessionStore>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            clock,
            store,
            settings,
            activity: None,
            inner: Mutex::new(TrackerInner {
                status: TrackerStatus::Idle,
                active: None,
                today: Vec::new(),
                saved: Vec::new(),
                weekly: None,
            }),
        }
    }

    /// Count activity into `log`.
    pub fn with_activity_log(mut self, log: SharedActivityLog) -> Self {
        self.activity = Some(log);
        self
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn status(&self) -> TrackerStatus {
        self.lock().status
    }

    pub fn is_tracking(&self) -> bool {
        self.status() == TrackerStatus::Tracking
    }

    /// Kicks in the current session, 0 when idle.
    pub fn kick_count(&self) -> u32 {
        self.lock().active.as_ref().map_or(0, |s| s.kick_count)
    }

    /// Seconds ticked in the current session, 0 when idle.
    pub fn elapsed_secs(&self) -> u64 {
        self.lock().active.as_ref().map_or(0, ActiveSession::elapsed_secs)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            status: inner.status,
            kick_count: inner.active.as_ref().map_or(0, |s| s.kick_count),
            elapsed_secs: inner.active.as_ref().map_or(0, ActiveSession::elapsed_secs),
            started_at: inner.active.as_ref().map(|s| s.started_at),
        }
    }

    /// Begin a new session.
    pub fn start(&self) -> Result<SessionSnapshot, TrackerError> {
        let mut inner = self.lock();
        match inner.status {
            TrackerStatus::Idle => {}
            TrackerStatus::Tracking => return Err(TrackerError::AlreadyTracking),
            TrackerStatus::Saving => return Err(TrackerError::SaveInProgress),
        }

        // Each session gets its own counter so a straggling tick from an
        // aborted task can never touch the new session.
        let elapsed = Arc::new(AtomicU64::new(0));
        let tick_counter = Arc::clone(&elapsed);
        let ticker = self.clock.every(
            TICK_INTERVAL,
            Box::new(move || {
                tick_counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let session = ActiveSession {
            id: Uuid::new_v4(),
            kick_count: 0,
            started_at: self.clock.now(),
            elapsed,
            goal_notified: false,
            _ticker: ticker,
        };
        tracing::info!(session_id = %session.id, started_at = %session.started_at, "tracking started");

        let snapshot = SessionSnapshot {
            status: TrackerStatus::Tracking,
            kick_count: 0,
            elapsed_secs: 0,
            started_at: Some(session.started_at),
        };
        inner.active = Some(session);
        inner.status = TrackerStatus::Tracking;
        drop(inner);

        self.log_activity(Activity::SessionStarted);
        Ok(snapshot)
    }

    /// Record one kick. Does nothing unless a session is being tracked.
    ///
    /// Returns [`Notice::GoalReached`] the first time the session reaches the
    /// goal.
    pub fn record_kick(&self) -> Option<Notice> {
        let mut inner = self.lock();
        if inner.status != TrackerStatus::Tracking {
            return None;
        }
        let session = inner.active.as_mut()?;

        session.kick_count += 1;
        let kicks = session.kick_count;
        tracing::debug!(session_id = %session.id, kicks, "kick recorded");

        let notice = if !session.goal_notified && kicks >= self.settings.goal_kicks {
            session.goal_notified = true;
            tracing::info!(session_id = %session.id, kicks, "kick goal reached");
            Some(Notice::GoalReached { kicks })
        } else {
            None
        };
        drop(inner);

        self.log_activity(Activity::Kick);
        notice
    }

    /// End the current session.
    ///
    /// Sessions without kicks are dropped locally. Otherwise the session is
    /// sent to the store exactly once; on failure the kicks are not kept and
    /// the tracker is Idle again either way.
    pub async fn stop(&self) -> Result<StopOutcome, TrackerError> {
        let finished = {
            let mut inner = self.lock();
            match inner.status {
                TrackerStatus::Tracking => {}
                TrackerStatus::Idle => return Err(TrackerError::NotTracking),
                TrackerStatus::Saving => return Err(TrackerError::SaveInProgress),
            }
            let Some(session) = inner.active.take() else {
                inner.status = TrackerStatus::Idle;
                return Err(TrackerError::NotTracking);
            };

            // Dropping the session cancels its tick.
            let finished = FinishedSession {
                id: session.id,
                kicks: session.kick_count,
                elapsed_secs: session.elapsed_secs(),
            };
            drop(session);

            if finished.kicks == 0 {
                inner.status = TrackerStatus::Idle;
                drop(inner);
                tracing::info!(session_id = %finished.id, "session had no kicks, discarded");
                let outcome = StopOutcome::Discarded {
                    elapsed_secs: finished.elapsed_secs,
                };
                self.log_activity((&outcome).into());
                return Ok(outcome);
            }

            inner.status = TrackerStatus::Saving;
            finished
        };

        let _guard = SavingGuard { inner: &self.inner };
        let notes = duration_note(finished.elapsed_secs);
        tracing::info!(
            session_id = %finished.id,
            kicks = finished.kicks,
            elapsed_secs = finished.elapsed_secs,
            "saving session"
        );

        let result = self
            .bounded(self.store.create_session(finished.kicks, &notes))
            .await;

        match result {
            Ok(stored) => {
                let session = PersistedSession {
                    kicks: finished.kicks,
                    duration_secs: Some(finished.elapsed_secs),
                    ..stored
                };
                {
                    let mut inner = self.lock();
                    inner.today.push(session.clone());
                    inner.saved.push(session.clone());
                    inner.status = TrackerStatus::Idle;
                }

                let advisory = self.low_kick_advisory(finished.kicks, finished.elapsed_secs);
                if advisory.is_some() {
                    tracing::warn!(
                        session_id = %finished.id,
                        kicks = finished.kicks,
                        elapsed_secs = finished.elapsed_secs,
                        "low kick count"
                    );
                }
                let outcome = StopOutcome::Saved { session, advisory };
                self.log_activity((&outcome).into());
                Ok(outcome)
            }
            Err(e) => {
                self.lock().status = TrackerStatus::Idle;
                tracing::warn!(
                    session_id = %finished.id,
                    kicks = finished.kicks,
                    "session could not be saved, kicks discarded: {e}"
                );
                self.log_activity(Activity::SaveFailed {
                    kicks: finished.kicks,
                });
                Err(e)
            }
        }
    }

    /// Reload the day's session list from the store.
    ///
    /// Sessions saved by this tracker that the response does not include yet
    /// (a save that finished while the list was in flight) are kept. The
    /// merged list, ordered by timestamp, is returned.
    pub async fn fetch_today_sessions(&self) -> Result<Vec<PersistedSession>, TrackerError> {
        let mut sessions = self
            .bounded(self.store.list_sessions(TODAY_DAYS))
            .await
            .map_err(|e| {
                tracing::warn!("could not load today's sessions: {e}");
                e
            })?;

        let tz = self.settings.timezone;
        let date = self.clock.now().with_timezone(&tz).date_naive();
        let mut inner = self.lock();

        inner.saved.retain(|s| s.local_date(tz) >= date);
        let pending: Vec<PersistedSession> = inner
            .saved
            .iter()
            .filter(|saved| !sessions.iter().any(|s| same_record(s, saved)))
            .cloned()
            .collect();
        if !pending.is_empty() {
            tracing::debug!(pending = pending.len(), "keeping saves missing from the listing");
        }
        sessions.extend(pending);
        sessions.sort_by_key(|s| s.timestamp);

        inner.today = sessions.clone();
        Ok(sessions)
    }

    /// Load the weekly chart. Prior data is kept when this fails.
    pub async fn fetch_weekly_trend(&self) -> Result<WeeklyChart, TrackerError> {
        let chart = self
            .bounded(self.store.weekly_chart(TREND_DAYS))
            .await
            .map_err(|e| {
                tracing::warn!("could not load weekly trend: {e}");
                e
            })?;

        self.lock().weekly = Some(chart.clone());
        Ok(chart)
    }

    /// Sessions known for today, in the order they were loaded or saved.
    pub fn today_sessions(&self) -> Vec<PersistedSession> {
        self.lock().today.clone()
    }

    /// Last successfully loaded weekly chart.
    pub fn weekly_trend(&self) -> Option<WeeklyChart> {
        self.lock().weekly.clone()
    }

    /// Today's persisted kicks plus the running session's kicks.
    pub fn today_total(&self) -> u32 {
        self.daily_aggregate().total()
    }

    pub fn daily_aggregate(&self) -> DailyAggregate {
        let tz = self.settings.timezone;
        let date = self.clock.now().with_timezone(&tz).date_naive();
        let inner = self.lock();
        let in_progress = match (inner.status, inner.active.as_ref()) {
            (TrackerStatus::Tracking, Some(session)) => session.kick_count,
            _ => 0,
        };
        DailyAggregate::compute(date, tz, &inner.today, in_progress)
    }

    fn low_kick_advisory(&self, kicks: u32, elapsed_secs: u64) -> Option<Notice> {
        (kicks < self.settings.low_kick_threshold
            && elapsed_secs > self.settings.low_kick_window.as_secs())
        .then_some(Notice::LowKickCount {
            kicks,
            elapsed_secs,
        })
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, TrackerError> {
        let limit = self.settings.request_timeout;
        match tokio::time::timeout(limit, request).await {
            Ok(result) => result.map_err(TrackerError::Store),
            Err(_) => Err(TrackerError::Timeout(limit)),
        }
    }

    fn log_activity(&self, activity: Activity) {
        if let Some(log) = &self.activity {
            log.record(activity);
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTracker")
            .field("settings", &self.settings)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

fn same_record(a: &PersistedSession, b: &PersistedSession) -> bool {
    a.timestamp == b.timestamp && a.kicks == b.kicks
}

/// Puts the tracker back to Idle if a save is abandoned mid-flight.
struct SavingGuard<'a> {
    inner: &'a Mutex<TrackerInner>,
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.status == TrackerStatus::Saving {
            tracing::warn!("save abandoned before completion");
            inner.status = TrackerStatus::Idle;
        }
    }
}
