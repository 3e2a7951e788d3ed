//! Integration tests for the HTTP session store against a fake care API.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use kick_counter::{
    ApiConfig, HttpSessionStore, ManualClock, SessionStore, SessionTracker, StaticToken,
    StopOutcome, StoreError, TrackerSettings, TrackerStatus,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

const TOKEN: &str = "test-token";

#[derive(Default)]
struct Backend {
    hits: AtomicUsize,
    created: Mutex<Vec<Value>>,
    fail_with: Mutex<Option<(StatusCode, String)>>,
}

impl Backend {
    /// Count the request and check its credential.
    fn admit(&self, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
        self.hits.fetch_add(1, Ordering::SeqCst);

        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {TOKEN}"))
            .unwrap_or(false);
        if !authorized {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid token" })),
            ));
        }
        Ok(())
    }
}

async fn list(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(rejection) = backend.admit(&headers) {
        return rejection.into_response();
    }
    assert_eq!(query.get("days").map(String::as_str), Some("1"));

    Json(json!({
        "kickCounts": [
            { "count": 8, "timestamp": "2024-06-10T07:30:00.000Z", "notes": "Duration: 00:25:10" },
            { "count": 3, "timestamp": "2024-06-10T08:10:00.000Z" }
        ]
    }))
    .into_response()
}

async fn create(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if let Err(rejection) = backend.admit(&headers) {
        return rejection.into_response();
    }
    if let Some((status, body)) = backend.fail_with.lock().unwrap().clone() {
        return (status, body).into_response();
    }

    backend.created.lock().unwrap().push(body.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "kickCount": {
                "count": body["count"],
                "notes": body["notes"],
                "timestamp": "2024-06-10T09:05:00.000Z"
            }
        })),
    )
        .into_response()
}

async fn chart(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(rejection) = backend.admit(&headers) {
        return rejection.into_response();
    }
    assert_eq!(query.get("days").map(String::as_str), Some("7"));

    Json(json!({
        "chart": {
            "data": {
                "labels": ["Tue", "Wed", "Thu", "Fri", "Sat", "Sun", "Mon"],
                "datasets": [{ "label": "Kicks", "data": [10, 12, 9, 14, 11, 10, 11] }]
            }
        }
    }))
    .into_response()
}

async fn spawn_backend() -> (SocketAddr, Arc<Backend>, tokio::sync::oneshot::Sender<()>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/kick-count", get(list).post(create))
        .route("/api/kick-count/chart", get(chart))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    (addr, backend, shutdown_tx)
}

fn store(addr: SocketAddr, token: &str) -> HttpSessionStore {
    let config = ApiConfig::new(format!("http://{addr}/api"), Duration::from_secs(5));
    HttpSessionStore::new(config, Arc::new(StaticToken::new(token))).expect("client")
}

#[tokio::test]
async fn test_list_sessions() {
    let (addr, _backend, shutdown_tx) = spawn_backend().await;

    let sessions = store(addr, TOKEN).list_sessions(1).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].kicks, 8);
    assert_eq!(sessions[0].duration_secs, Some(1510));
    assert_eq!(sessions[1].kicks, 3);
    assert_eq!(sessions[1].duration_secs, None);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_create_session_sends_count_and_notes() {
    let (addr, backend, shutdown_tx) = spawn_backend().await;

    let session = store(addr, TOKEN)
        .create_session(12, "Duration: 00:40:00")
        .await
        .unwrap();
    assert_eq!(session.kicks, 12);
    assert_eq!(session.duration_secs, Some(2400));
    assert_eq!(session.timestamp.to_rfc3339(), "2024-06-10T09:05:00+00:00");

    let created = backend.created.lock().unwrap().clone();
    assert_eq!(
        created,
        vec![json!({ "count": 12, "notes": "Duration: 00:40:00" })]
    );

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_weekly_chart() {
    let (addr, _backend, shutdown_tx) = spawn_backend().await;

    let chart = store(addr, TOKEN).weekly_chart(7).await.unwrap();
    assert_eq!(chart.labels.len(), 7);
    assert_eq!(chart.values[3], 14.0);
    let summary = chart.summary().unwrap();
    assert_eq!(summary.max, 14.0);
    assert_eq!(summary.min, 9.0);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_server_error_message_from_body() {
    let (addr, _backend, shutdown_tx) = spawn_backend().await;

    let err = store(addr, "wrong-token").list_sessions(1).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::Server {
            status: 401,
            message: "Invalid token".to_string()
        }
    );

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_server_error_without_body_uses_fallback() {
    let (addr, backend, shutdown_tx) = spawn_backend().await;
    *backend.fail_with.lock().unwrap() =
        Some((StatusCode::BAD_GATEWAY, "<html>upstream down</html>".to_string()));

    let err = store(addr, TOKEN).create_session(2, "x").await.unwrap_err();
    assert_eq!(
        err,
        StoreError::Server {
            status: 502,
            message: kick_counter::store::GENERIC_ERROR_MESSAGE.to_string()
        }
    );

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_missing_credential_sends_nothing() {
    let (addr, backend, shutdown_tx) = spawn_backend().await;
    let store = store(addr, "");

    assert_eq!(
        store.list_sessions(1).await.unwrap_err(),
        StoreError::CredentialMissing
    );
    assert_eq!(
        store.create_session(5, "x").await.unwrap_err(),
        StoreError::CredentialMissing
    );
    assert_eq!(
        store.weekly_chart(7).await.unwrap_err(),
        StoreError::CredentialMissing
    );
    assert_eq!(backend.hits.load(Ordering::SeqCst), 0);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    // bind and immediately drop to get a closed port
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let err = store(addr, TOKEN).list_sessions(1).await.unwrap_err();
    assert!(matches!(err, StoreError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_tracker_over_http() {
    let (addr, backend, shutdown_tx) = spawn_backend().await;
    let start = chrono::DateTime::parse_from_rfc3339("2024-06-10T09:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let clock = Arc::new(ManualClock::new(start));
    let tracker = SessionTracker::new(
        clock.clone(),
        Arc::new(store(addr, TOKEN)),
        TrackerSettings::default(),
    );

    tracker.fetch_today_sessions().await.unwrap();
    assert_eq!(tracker.today_total(), 11);

    tracker.start().unwrap();
    for _ in 0..5 {
        tracker.record_kick();
    }
    clock.advance_secs(300);
    assert_eq!(tracker.today_total(), 16);

    let outcome = tracker.stop().await.unwrap();
    assert!(matches!(outcome, StopOutcome::Saved { advisory: None, .. }));
    assert_eq!(tracker.status(), TrackerStatus::Idle);
    assert_eq!(tracker.today_total(), 16);
    assert_eq!(
        backend.created.lock().unwrap()[0],
        json!({ "count": 5, "notes": "Duration: 00:05:00" })
    );

    let _ = shutdown_tx.send(());
}
