//! HTTP surface for the collector.
//!
//! - `GET /` opens a collection window and answers with the snapshot once it closes
//! - `POST /collect?instrument=<id>` submits a sample
//! - `GET /ping` answers 200 when idle, 501 while a window is open
//! - `GET /health` JSON status for humans and dashboards
//! - `OPTIONS *` answers the CORS preflight

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::CollectorError;
use crate::session::{SessionCoordinator, SessionState};

/// Filename offered to the browser for the snapshot download.
pub const SNAPSHOT_FILENAME: &str = "dump.json";

/// Preflight cache lifetime, one day.
const CORS_MAX_AGE_SECS: &str = "86400";

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self {
            coordinator,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // axum routes HEAD to the GET handler unless HEAD has its own
        .route("/", get(snapshot).head(method_not_allowed))
        .route("/collect", post(collect))
        .route("/ping", get(ping))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
}

/// Stamp permissive CORS headers on every response and short-circuit
/// preflight requests.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(CORS_MAX_AGE_SECS),
    );
    response
}

/// Open a window, wait for it to close, and return the snapshot as a download.
#[tracing::instrument(name = "http.snapshot", skip(state))]
async fn snapshot(State(state): State<AppState>) -> Result<Response, CollectorError> {
    let pending = state.coordinator.open_window()?;
    let snapshot = pending.wait().await?;
    let body = snapshot.to_pretty_json().map_err(CollectorError::Serialize)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", SNAPSHOT_FILENAME),
            ),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct CollectQuery {
    instrument: Option<String>,
}

/// Accept one sample. Success does not mean it was kept: outside a window
/// samples are dropped silently.
async fn collect(
    State(state): State<AppState>,
    Query(query): Query<CollectQuery>,
    body: Bytes,
) -> Result<StatusCode, CollectorError> {
    let instrument = query
        .instrument
        .filter(|id| !id.is_empty())
        .ok_or(CollectorError::MissingInstrument)?;
    let payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(CollectorError::InvalidPayload)?;

    state.coordinator.ingest(&instrument, payload);
    Ok(StatusCode::OK)
}

/// Readiness probe for callers about to request a snapshot.
async fn ping(State(state): State<AppState>) -> StatusCode {
    match state.coordinator.status() {
        SessionState::Idle => StatusCode::OK,
        SessionState::Collecting => StatusCode::NOT_IMPLEMENTED,
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let coordinator = &state.coordinator;
    let session = coordinator.status();
    let status = match session {
        SessionState::Idle => "ready",
        SessionState::Collecting => "busy",
    };

    Json(serde_json::json!({
        "status": status,
        "session": session.as_str(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "window_ms": coordinator.window().as_millis() as u64,
        "instruments": coordinator.instrument_count(),
        "stats": coordinator.stats(),
    }))
}

/// Only a GET may open a collection window.
async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Server configuration
pub struct ServeConfig {
    /// `host:port` to listen on
    pub addr: String,
    pub window: Duration,
}

/// Run the collector until SIGINT/SIGTERM.
pub async fn run(config: ServeConfig) -> Result<()> {
    info!("📡 gather collector starting");
    info!("   Window: {} ms", config.window.as_millis());

    let coordinator = Arc::new(SessionCoordinator::new(config.window));
    let app = router(AppState::new(coordinator));

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    info!("📡 gather ready on http://{}", config.addr);
    info!("   Snapshot: GET  /");
    info!("   Collect:  POST /collect?instrument=<id>");
    info!("   Ping:     GET  /ping");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
