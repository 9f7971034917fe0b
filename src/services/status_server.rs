//! Status HTTP server
//!
//! Serves a continuously regenerated snapshot so the dashboard's primary
//! endpoint exists without a live agent. `/status` answers 503 until the
//! first snapshot has been produced.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::domain::{ReasoningEntry, Snapshot};
use crate::error::{DecisifyError, Result};
use crate::simulation::SimulatorState;

/// Number of reasoning entries kept in the served thought log
pub const THOUGHT_HISTORY: usize = 20;

const SERVICE_NAME: &str = "decisify";

/// Shared state for the status server
pub struct StatusState {
    pub started_at: DateTime<Utc>,
    snapshot: RwLock<Option<Snapshot>>,
    cycles: RwLock<u64>,
}

impl StatusState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            snapshot: RwLock::new(None),
            cycles: RwLock::new(0),
        }
    }

    /// Publish a new snapshot. Its thoughts are prepended to the served log.
    pub async fn publish(&self, mut snapshot: Snapshot) {
        let mut current = self.snapshot.write().await;
        if let Some(previous) = current.as_ref() {
            let mut thoughts: Vec<ReasoningEntry> = std::mem::take(&mut snapshot.agent_thoughts);
            let older: Vec<ReasoningEntry> = previous
                .agent_thoughts
                .iter()
                .filter(|t| !thoughts.iter().any(|n| n.id == t.id))
                .cloned()
                .collect();
            thoughts.extend(older);
            thoughts.truncate(THOUGHT_HISTORY);
            snapshot.agent_thoughts = thoughts;
        }
        *current = Some(snapshot);
        *self.cycles.write().await += 1;
    }

    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn cycles(&self) -> u64 {
        *self.cycles.read().await
    }
}

impl Default for StatusState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub cycles: u64,
    pub has_snapshot: bool,
}

/// Status server
pub struct StatusServer {
    state: Arc<StatusState>,
    config: ServerConfig,
}

impl StatusServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: Arc::new(StatusState::new()),
            config,
        }
    }

    pub fn state(&self) -> Arc<StatusState> {
        Arc::clone(&self.state)
    }

    /// Router with all endpoints
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Regenerate the served snapshot on a fixed period until the task is dropped
    pub fn spawn_refresh(&self) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let period = Duration::from_millis(self.config.refresh_ms.max(1));
        tokio::spawn(async move {
            let mut generator = SimulatorState::new();
            let mut rng = StdRng::from_entropy();
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let snapshot = generator.generate(&mut rng, Utc::now());
                state.publish(snapshot).await;
                debug!("Status snapshot refreshed");
            }
        })
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let refresh = self.spawn_refresh();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        info!("Starting status server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| DecisifyError::Internal(format!("Status server error: {}", e)));

        refresh.abort();
        info!("Status server stopped");
        served
    }
}

pub fn router(state: Arc<StatusState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "status": "running",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    match state.snapshot().await {
        Some(snapshot) => (StatusCode::OK, Json(json!(snapshot))),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "initializing",
                "message": "No decisions yet - agent loop is warming up",
            })),
        ),
    }
}

async fn health_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    let has_snapshot = state.snapshot.read().await.is_some();
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0) as u64;
    Json(HealthResponse {
        status: if has_snapshot { "healthy" } else { "initializing" },
        timestamp: Utc::now(),
        uptime_seconds: uptime,
        cycles: state.cycles().await,
        has_snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_initializing_before_first_snapshot() {
        let state = Arc::new(StatusState::new());
        let (status, body) = get_json(router(state), "/status").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "initializing");
    }

    #[tokio::test]
    async fn test_status_serves_valid_snapshot() {
        let state = Arc::new(StatusState::new());
        let mut rng = StdRng::seed_from_u64(5);
        state
            .publish(SimulatorState::new().generate(&mut rng, Utc::now()))
            .await;

        let (status, body) = get_json(router(state), "/status").await;
        assert_eq!(status, StatusCode::OK);
        let snapshot = Snapshot::from_value(body).unwrap();
        assert_eq!(snapshot.agent_thoughts.len(), 1);
    }

    #[tokio::test]
    async fn test_publish_keeps_rolling_thought_log() {
        let state = StatusState::new();
        let mut generator = SimulatorState::new();
        let mut rng = StdRng::seed_from_u64(11);
        let start = Utc::now();
        for i in 0..(THOUGHT_HISTORY as i64 + 5) {
            let snapshot = generator.generate(&mut rng, start + chrono::Duration::seconds(i));
            state.publish(snapshot).await;
        }

        let served = state.snapshot().await.unwrap();
        assert_eq!(served.agent_thoughts.len(), THOUGHT_HISTORY);
        assert!(served.agent_thoughts[0].id > served.agent_thoughts[1].id);
        assert_eq!(state.cycles().await, THOUGHT_HISTORY as u64 + 5);
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let state = Arc::new(StatusState::new());
        let (status, body) = get_json(router(Arc::clone(&state)), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "decisify");

        let (status, body) = get_json(router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_snapshot"], false);
    }
}
