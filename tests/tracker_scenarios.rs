//! End-to-end tracker scenarios over a manual clock and an in-memory store.

use chrono::{DateTime, Utc};
use kick_counter::{
    InMemorySessionStore, ManualClock, Notice, SessionTracker, StopOutcome, StoreError,
    TrackerError, TrackerSettings, TrackerStatus,
};
use std::sync::Arc;

fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-10T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn setup() -> (Arc<ManualClock>, InMemorySessionStore, SessionTracker) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = InMemorySessionStore::new(clock.clone());
    let tracker = SessionTracker::new(
        clock.clone(),
        Arc::new(store.clone()),
        TrackerSettings::default(),
    );
    (clock, store, tracker)
}

#[tokio::test]
async fn test_twelve_kicks_fire_goal_on_tenth_and_persist_twelve() {
    let (clock, store, tracker) = setup();
    tracker.start().unwrap();

    for kick in 1..=12 {
        clock.advance_secs(400);
        let notice = tracker.record_kick();
        if kick == 10 {
            assert_eq!(notice, Some(Notice::GoalReached { kicks: 10 }));
        } else {
            assert_eq!(notice, None, "unexpected notice at kick {kick}");
        }
    }
    // past the low-kick window; twelve kicks never raise the advisory
    clock.advance_secs(3000);
    assert_eq!(tracker.elapsed_secs(), 7800);

    let outcome = tracker.stop().await.unwrap();
    let StopOutcome::Saved { session, advisory } = outcome else {
        panic!("expected the session to be saved");
    };
    assert_eq!(session.kicks, 12);
    assert_eq!(advisory, None);
    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.sessions()[0].kicks, 12);
}

#[tokio::test]
async fn test_stop_without_kicks_makes_no_request() {
    let (clock, store, tracker) = setup();
    tracker.start().unwrap();
    clock.advance_secs(600);

    let outcome = tracker.stop().await.unwrap();
    assert!(matches!(outcome, StopOutcome::Discarded { elapsed_secs: 600 }));
    assert_eq!(store.create_calls(), 0);
    assert_eq!(tracker.status(), TrackerStatus::Idle);
    assert!(tracker.today_sessions().is_empty());
}

#[tokio::test]
async fn test_few_kicks_over_two_hours_raise_advisory() {
    let (clock, _store, tracker) = setup();
    tracker.start().unwrap();
    for _ in 0..3 {
        tracker.record_kick();
    }
    clock.advance_secs(7201);

    let outcome = tracker.stop().await.unwrap();
    let StopOutcome::Saved { session, advisory } = outcome else {
        panic!("expected the session to be saved");
    };
    assert_eq!(session.kicks, 3);
    assert_eq!(session.duration_secs, Some(7201));
    assert_eq!(
        advisory,
        Some(Notice::LowKickCount {
            kicks: 3,
            elapsed_secs: 7201
        })
    );
    assert!(advisory.unwrap().to_string().contains("healthcare provider"));
}

#[tokio::test]
async fn test_failed_save_discards_local_count() {
    let (clock, store, tracker) = setup();
    store.set_failure(Some(StoreError::Network("connection reset".into())));

    tracker.start().unwrap();
    for _ in 0..4 {
        tracker.record_kick();
    }
    clock.advance_secs(7300);

    let err = tracker.stop().await.unwrap_err();
    assert!(matches!(err, TrackerError::Store(StoreError::Network(_))));
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(tracker.status(), TrackerStatus::Idle);
    assert_eq!(tracker.kick_count(), 0);
    assert!(tracker.today_sessions().is_empty());
    assert_eq!(tracker.today_total(), 0);
}

#[tokio::test]
async fn test_kick_count_matches_number_of_taps() {
    let (clock, _store, tracker) = setup();

    // taps before starting are ignored
    for _ in 0..3 {
        assert_eq!(tracker.record_kick(), None);
    }

    tracker.start().unwrap();
    for taps in 1..=25u32 {
        tracker.record_kick();
        clock.advance_secs(1);
        assert_eq!(tracker.kick_count(), taps);
    }
    assert_eq!(tracker.snapshot().elapsed_secs, 25);
}

#[tokio::test]
async fn test_daily_total_across_sessions() {
    let (clock, _store, tracker) = setup();

    for kicks in [4, 7] {
        tracker.start().unwrap();
        for _ in 0..kicks {
            tracker.record_kick();
        }
        clock.advance_secs(900);
        tracker.stop().await.unwrap();
    }
    assert_eq!(tracker.today_total(), 11);

    tracker.fetch_today_sessions().await.unwrap();
    assert_eq!(tracker.today_sessions().len(), 2);
    assert_eq!(tracker.today_total(), 11);

    // the next day starts from zero
    clock.advance_secs(24 * 3600);
    assert_eq!(tracker.today_total(), 0);
}
