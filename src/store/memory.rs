//! In-memory session store.
//!
//! Assigns server timestamps from its own [`Clock`], counts requests, and
//! can be told to fail or stall, which is what the tracker tests need.

use super::{SessionStore, StoreError};
use crate::clock::Clock;
use crate::core::session::{PersistedSession, WeeklyChart};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct MemoryState {
    sessions: Vec<PersistedSession>,
    failure: Option<StoreError>,
    create_delay: Option<Duration>,
    list_delay: Option<Duration>,
}

/// A [`SessionStore`] that keeps everything in a `Vec`.
#[derive(Clone)]
pub struct InMemorySessionStore {
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<MemoryState>>,
    create_calls: Arc<AtomicUsize>,
}

impl InMemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(MemoryState::default())),
            create_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pre-load a session as if it had been created earlier.
    pub fn seed(&self, session: PersistedSession) {
        self.lock().sessions.push(session);
    }

    /// Make every following request fail with `error` (or succeed again
    /// with `None`).
    pub fn set_failure(&self, error: Option<StoreError>) {
        self.lock().failure = error;
    }

    /// Delay `create_session` responses, simulating a slow backend.
    pub fn set_create_delay(&self, delay: Option<Duration>) {
        self.lock().create_delay = delay;
    }

    /// Delay `list_sessions` responses. The list is read before the delay,
    /// like a response already on the wire.
    pub fn set_list_delay(&self, delay: Option<Duration>) {
        self.lock().list_delay = delay;
    }

    /// Number of `create_session` requests received, failed ones included.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Everything stored so far.
    pub fn sessions(&self) -> Vec<PersistedSession> {
        self.lock().sessions.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match &self.lock().failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn within_days(&self, days: u32) -> Vec<PersistedSession> {
        let cutoff = self.clock.now() - chrono::Duration::days(i64::from(days));
        self.lock()
            .sessions
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn list_sessions(&self, days: u32) -> Result<Vec<PersistedSession>, StoreError> {
        self.check_failure()?;
        let sessions = self.within_days(days);

        let delay = self.lock().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(sessions)
    }

    async fn create_session(
        &self,
        count: u32,
        notes: &str,
    ) -> Result<PersistedSession, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.lock().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure()?;

        let session =
            PersistedSession::from_store(count, self.clock.now(), Some(notes.to_string()));
        self.lock().sessions.push(session.clone());
        Ok(session)
    }

    async fn weekly_chart(&self, days: u32) -> Result<WeeklyChart, StoreError> {
        self.check_failure()?;

        let today = self.clock.now().date_naive();
        let sessions = self.within_days(days);
        let mut chart = WeeklyChart::default();

        for offset in (0..i64::from(days)).rev() {
            let date = today - chrono::Duration::days(offset);
            let kicks: u32 = sessions
                .iter()
                .filter(|s| s.timestamp.date_naive() == date)
                .map(|s| s.kicks)
                .sum();
            chart.labels.push(date.format("%a").to_string());
            chart.values.push(f64::from(kicks));
        }

        Ok(chart)
    }
}
