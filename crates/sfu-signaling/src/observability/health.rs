//! Health and status endpoints.
//!
//! Kubernetes-compatible probes plus a store snapshot:
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (can we serve traffic?)
//! - `GET /status` - JSON snapshot of rooms, peers, and session counters
//!
//! # Health State
//!
//! The `HealthState` tracks:
//! - `live`: Always true after startup (process is running)
//! - `ready`: True once the engine worker and listeners are up

use crate::actors::{SessionActorHandle, SessionMetrics};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Health state for the signaling server.
///
/// Tracks liveness and readiness for Kubernetes probes.
#[derive(Debug)]
pub struct HealthState {
    /// Whether the service is live (process running).
    /// Always true after startup initialization.
    live: AtomicBool,
    /// Whether the service is ready to serve traffic.
    /// True once the worker exists and the listeners are bound.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the service as ready to serve traffic.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the service as not ready (e.g., during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Check if the service is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Check if the service is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Shared state for the observability router.
#[derive(Clone)]
struct ObservabilityState {
    health: Arc<HealthState>,
    session: SessionActorHandle,
    metrics: Arc<SessionMetrics>,
}

/// Create the observability router.
///
/// # Endpoints
///
/// - `GET /health` - Returns 200 if the process is running (liveness)
/// - `GET /ready` - Returns 200 if ready to serve traffic, 503 otherwise
/// - `GET /status` - Returns the session store snapshot and counters as JSON
pub fn observability_router(
    health: Arc<HealthState>,
    session: SessionActorHandle,
    metrics: Arc<SessionMetrics>,
) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .with_state(ObservabilityState {
            health,
            session,
            metrics,
        })
}

/// Liveness probe handler.
///
/// Returns 200 OK if the process is running.
async fn liveness_handler(State(state): State<ObservabilityState>) -> StatusCode {
    if state.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Readiness probe handler.
///
/// Returns 200 OK if the service is ready to serve traffic, 503 otherwise.
async fn readiness_handler(State(state): State<ObservabilityState>) -> StatusCode {
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Status handler: rooms, peers, and counters.
///
/// Returns 503 if the session actor is gone (shutdown in progress).
async fn status_handler(State(state): State<ObservabilityState>) -> axum::response::Response {
    match state.session.status().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "store": snapshot,
                "metrics": state.metrics.snapshot(),
            })),
        )
            .into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use media_engine::{
        default_media_codecs, LocalEngine, MediaEngine, WebRtcTransportOptions, WorkerSettings,
    };
    use tower::util::ServiceExt;

    async fn test_router() -> (Router, Arc<HealthState>, SessionActorHandle) {
        let engine = LocalEngine::new();
        let worker = engine
            .create_worker(WorkerSettings::default())
            .await
            .unwrap();
        let metrics = Arc::new(SessionMetrics::new());
        let session = SessionActorHandle::new(
            worker,
            default_media_codecs(),
            WebRtcTransportOptions::default(),
            Arc::clone(&metrics),
        );

        let health = Arc::new(HealthState::new());
        let router = observability_router(Arc::clone(&health), session.clone(), metrics);
        (router, health, session)
    }

    #[test]
    fn test_health_state_default() {
        let state = HealthState::new();
        assert!(state.is_live(), "Should be live by default");
        assert!(!state.is_ready(), "Should not be ready by default");
    }

    #[test]
    fn test_health_state_set_ready() {
        let state = HealthState::new();

        state.set_ready();
        assert!(state.is_ready(), "Should be ready after set_ready()");

        state.set_not_ready();
        assert!(
            !state.is_ready(),
            "Should not be ready after set_not_ready()"
        );
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let (router, _health, _session) = test_router().await;

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = router.oneshot(request).await.expect("request failed");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_endpoint_tracks_state() {
        let (router, health, _session) = test_router().await;

        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        health.set_ready();
        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = router.oneshot(request).await.expect("request failed");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_rooms() {
        let (router, _health, session) = test_router().await;
        session
            .create_or_join_room("standup".to_string())
            .await
            .unwrap();

        let request = Request::builder()
            .uri("/status")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = router.oneshot(request).await.expect("request failed");
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        let rooms = json
            .get("store")
            .unwrap()
            .get("rooms")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms.first().unwrap().get("name").unwrap(), "standup");
        assert_eq!(
            json.get("metrics").unwrap().get("roomsCreated").unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let (router, _health, _session) = test_router().await;

        let request = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = router.oneshot(request).await.expect("request failed");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
