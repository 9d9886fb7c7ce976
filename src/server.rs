//! HTTP server exposing the engine's entry points.
//!
//! - `POST /heartbeat` runs single-cell mode for one location sample
//! - `GET /cells/:cell_id` classifies a cell without recording a heartbeat
//! - `GET /detect-silence` runs a batch-all pass (the scheduled trigger)
//! - `POST /classify` classifies externally supplied counts
//!
//! # Architecture
//!
//! ```text
//! Observer ──→ POST /heartbeat ──→ Engine::observe ──→ HeartbeatStore
//! Scheduler ─→ GET /detect-silence ──→ Engine::run_batch ──┘
//! ```
//!
//! Store calls run on the blocking pool under `store_timeout`; an expired
//! deadline surfaces as `504 STORE_TIMEOUT`.
//!
//! Observer sessions are kept in memory and forgotten after `session_ttl`
//! without a sample, or when more than `max_sessions` are tracked.

use crate::core::{classify, CellId, EngineError, Policy, Preset, WindowCounts};
use crate::engine::{Engine, ObserverSession};
use crate::store::{HeartbeatStore, StoreError};
use crate::transparency::{create_shared_log, SharedTransparencyLog, TransparencyStats};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Store shared by every request
    pub store: Arc<dyn HeartbeatStore>,
    pub realtime: Policy,
    pub batch: Policy,
    /// Deadline for one engine call against the store
    pub store_timeout: Duration,
    /// Sessions idle for longer than this are forgotten
    pub session_ttl: Duration,
    /// Upper bound on tracked sessions; the least recently active go first
    pub max_sessions: usize,
}

impl ServerConfig {
    pub fn new(port: u16, store: Arc<dyn HeartbeatStore>) -> Self {
        Self {
            port,
            store,
            realtime: Policy::realtime(),
            batch: Policy::batch(),
            store_timeout: Duration::from_secs(5),
            session_ttl: Duration::from_secs(30 * 60),
            max_sessions: 10_000,
        }
    }
}

/// Shared server state
pub struct ServerState {
    engine: Engine<Arc<dyn HeartbeatStore>>,
    /// Observing sessions keyed by their anonymous id
    sessions: Mutex<HashMap<Uuid, ObserverSession>>,
    store_timeout: Duration,
    session_ttl: Duration,
    max_sessions: usize,
    transparency: SharedTransparencyLog,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Result<Self, EngineError> {
        let transparency = create_shared_log();
        let engine = Engine::new(config.store.clone(), config.realtime, config.batch)?
            .with_transparency(transparency.clone());

        Ok(Self {
            engine,
            sessions: Mutex::new(HashMap::new()),
            store_timeout: config.store_timeout,
            session_ttl: config.session_ttl,
            max_sessions: config.max_sessions.max(1),
            transparency,
        })
    }

    /// Take a session out of the map, or start one under the requested id.
    async fn checkout(&self, id: Option<Uuid>) -> ObserverSession {
        let id = id.unwrap_or_else(Uuid::new_v4);
        self.sessions
            .lock()
            .await
            .remove(&id)
            .unwrap_or_else(|| ObserverSession::with_id(id))
    }

    /// Return a session to the map, evicting idle and excess sessions first.
    async fn checkin(&self, session: ObserverSession) {
        let mut sessions = self.sessions.lock().await;

        let cutoff = chrono::Duration::from_std(self.session_ttl)
            .ok()
            .and_then(|ttl| chrono::Utc::now().checked_sub_signed(ttl));
        let before = sessions.len();
        sessions.retain(|_, s| match (s.last_sample_at(), cutoff) {
            (Some(at), Some(cutoff)) => at >= cutoff,
            (Some(_), None) => true,
            (None, _) => false,
        });

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_sample_at())
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "Evicted observer sessions");
        }
        sessions.insert(session.id(), session);
    }

    /// Number of sessions currently tracked.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Body of `POST /heartbeat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub lat: f64,
    pub lng: f64,
    /// Existing session to continue; a new one is created when absent
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Body of `POST /classify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub cell_id: String,
    pub recent_count: i64,
    pub baseline_count: i64,
    /// Policy whose thresholds apply (default realtime)
    #[serde(default)]
    pub preset: Option<Preset>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: EngineError) -> ApiError {
    let (status, code) = match &e {
        EngineError::MalformedCellId(_) => (StatusCode::BAD_REQUEST, "MALFORMED_CELL_ID"),
        EngineError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        EngineError::Store(StoreError::Timeout(_)) => (StatusCode::GATEWAY_TIMEOUT, "STORE_TIMEOUT"),
        EngineError::Store(StoreError::Unavailable(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
        }
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Run an engine call on the blocking pool under the store deadline.
async fn with_store<T, F>(state: &Arc<ServerState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ServerState) -> Result<T, EngineError> + Send + 'static,
{
    let shared = state.clone();
    let task = tokio::task::spawn_blocking(move || f(shared.as_ref()));

    match tokio::time::timeout(state.store_timeout, task).await {
        Ok(Ok(result)) => result.map_err(api_error),
        Ok(Err(e)) => {
            tracing::error!("Engine task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Error detecting silence".to_string(),
                    code: "INTERNAL".to_string(),
                }),
            ))
        }
        Err(_) => Err(api_error(EngineError::Store(StoreError::Timeout(
            state.store_timeout,
        )))),
    }
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /heartbeat
async fn heartbeat(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<HeartbeatRequest>,
) -> Result<Json<crate::report::CellReport>, ApiError> {
    let mut session = state.checkout(request.session_id).await;
    let fallback = session.clone();

    let sample = crate::source::LocationSample::new(request.lat, request.lng);
    let outcome = with_store(&state, move |s| {
        // Engine errors travel back with the session so it is not lost.
        let report = s.engine.observe(&mut session, &sample);
        Ok((session, report))
    })
    .await;

    match outcome {
        Ok((session, report)) => {
            state.checkin(session).await;
            report.map(Json).map_err(api_error)
        }
        Err(e) => {
            // The engine call never finished; keep the session as it was.
            if request.session_id.is_some() {
                state.checkin(fallback).await;
            }
            Err(e)
        }
    }
}

/// GET /cells/:cell_id
async fn inspect_cell(
    State(state): State<Arc<ServerState>>,
    Path(cell_id): Path<String>,
) -> Result<Json<crate::report::CellReport>, ApiError> {
    let cell: CellId = cell_id.parse().map_err(api_error)?;
    with_store(&state, move |s| s.engine.inspect(cell))
        .await
        .map(Json)
}

/// GET /detect-silence
async fn detect_silence(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<crate::report::BatchReport>, ApiError> {
    with_store(&state, |s| s.engine.run_batch()).await.map(Json)
}

/// POST /classify
async fn classify_counts(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<crate::core::ClassificationResult>, ApiError> {
    let cell: CellId = request.cell_id.parse().map_err(api_error)?;
    let counts = WindowCounts::from_signed(cell, request.recent_count, request.baseline_count)
        .map_err(api_error)?;
    let policy = match request.preset.unwrap_or(Preset::Realtime) {
        Preset::Realtime => state.engine.realtime_policy(),
        Preset::Batch => state.engine.batch_policy(),
    };
    classify(&counts, &policy.thresholds)
        .map(Json)
        .map_err(api_error)
}

/// GET /stats
async fn stats(State(state): State<Arc<ServerState>>) -> Json<TransparencyStats> {
    Json(state.transparency.stats())
}

/// Build the router without binding a socket.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/heartbeat", post(heartbeat))
        .route("/cells/:cell_id", get(inspect_cell))
        .route("/detect-silence", get(detect_silence))
        .route("/classify", post(classify_counts))
        .route("/stats", get(stats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config)?);
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("signalvoid server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
