//! Time source and periodic tick scheduling.
//!
//! The tracker only depends on the [`Clock`] trait: a wall-clock `now()` and a
//! cancellable periodic callback. [`SystemClock`] drives ticks from a tokio
//! interval task, [`ManualClock`] is advanced explicitly and is what the tests
//! use to simulate hours of tracking in microseconds.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Callback invoked once per tick period.
pub type TickFn = Box<dyn FnMut() + Send + 'static>;

/// A source of time and periodic ticks.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Invoke `tick` once every `period` until the returned handle is
    /// cancelled or dropped.
    fn every(&self, period: Duration, tick: TickFn) -> TickHandle;
}

/// Owned handle to a running periodic tick.
///
/// Cancelling (or dropping) the handle stops the tick; there is no pause.
pub struct TickHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickHandle {
    /// Wrap a cancellation action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop the tick.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Real time, with ticks driven by tokio interval tasks.
#[derive(Debug, Clone)]
pub struct SystemClock {
    handle: tokio::runtime::Handle,
}

impl SystemClock {
    /// Create a clock spawning its tick tasks on the given runtime.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Create a clock on the runtime of the calling context.
    ///
    /// Returns `None` outside of a tokio runtime.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn every(&self, period: Duration, mut tick: TickFn) -> TickHandle {
        // tokio intervals panic on a zero period
        let period = period.max(Duration::from_millis(1));
        let task = self.handle.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                tick();
            }
        });
        TickHandle::new(move || task.abort())
    }
}

struct ManualTimer {
    period: Duration,
    carried: Duration,
    tick: TickFn,
}

struct ManualState {
    now: DateTime<Utc>,
    next_id: u64,
    timers: BTreeMap<u64, ManualTimer>,
}

/// A clock that only moves when told to.
///
/// Tick callbacks run synchronously inside [`ManualClock::advance`] and must
/// not call back into the clock.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: start,
                next_id: 0,
                timers: BTreeMap::new(),
            })),
        }
    }

    /// Move time forward, firing every due tick.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());

        for timer in state.timers.values_mut() {
            if timer.period.is_zero() {
                continue;
            }
            timer.carried += by;
            while timer.carried >= timer.period {
                timer.carried -= timer.period;
                (timer.tick)();
            }
        }
    }

    /// Advance by a whole number of seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Number of ticks that have not been cancelled.
    pub fn active_timers(&self) -> usize {
        self.lock().timers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn every(&self, period: Duration, tick: TickFn) -> TickHandle {
        let id = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.timers.insert(
                id,
                ManualTimer {
                    period,
                    carried: Duration::ZERO,
                    tick,
                },
            );
            id
        };

        let state = Arc::downgrade(&self.state);
        TickHandle::new(move || {
            if let Some(state) = state.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .timers
                    .remove(&id);
            }
        })
    }
}
