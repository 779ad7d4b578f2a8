//! HTTP endpoints
//!
//! REST API for driving calls turn by turn.

use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, MatchedPath, Path, Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use cold_call_agent::CallSummary;
use cold_call_core::{CallContext, TurnResult};

use crate::auth::auth_middleware;
use crate::metrics::{self, metrics_handler};
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);
    let request_timeout = Duration::from_secs(config.server.timeout_seconds);
    if !config.server.auth.enabled {
        tracing::warn!(
            "API authentication is DISABLED. Set COLD_CALL__SERVER__AUTH__ENABLED=true for production."
        );
    }
    drop(config);

    Router::new()
        .route("/call/start", post(start_call))
        .route("/call/turn", post(process_turn))
        .route("/call/:session_id", get(get_call).delete(end_call))
        .route("/calls", get(list_calls))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route_layer(axum::middleware::from_fn(track_requests))
        // auth runs inside CORS and tracing, before handlers
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state)
}

/// CORS from configured origins
///
/// Disabled means permissive (development only). No origins falls back to
/// localhost:3000.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let localhost = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_methods(methods.clone())
        .allow_headers(Any);

    if origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return localhost;
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        return localhost;
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods(methods)
        .allow_headers(Any)
}

/// Per-route request counter and latency histogram
async fn track_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    metrics::record_request(&path, &method, response.status().as_u16(), started.elapsed());
    response
}

/// Start call request
#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    /// Generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
    pub context: CallContext,
}

/// Start call response
#[derive(Debug, Serialize, Deserialize)]
pub struct StartCallResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub result: TurnResult,
}

async fn start_call(
    State(state): State<AppState>,
    payload: Result<Json<StartCallRequest>, JsonRejection>,
) -> Result<Json<StartCallResponse>, ServerError> {
    let Json(request) = payload.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    let session_id = request
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let result = state.calls.start(&session_id, request.context).await?;
    metrics::record_call_started();

    Ok(Json(StartCallResponse { session_id, result }))
}

/// Turn request
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub prospect_message: String,
}

async fn process_turn(
    State(state): State<AppState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnResult>, ServerError> {
    let Json(request) = payload.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;

    let started = Instant::now();
    let result = state
        .calls
        .turn(&request.session_id, &request.prospect_message)
        .await?;

    metrics::record_turn(result.state, started.elapsed());
    if result.is_call_over {
        metrics::record_call_ended();
    }

    Ok(Json(result))
}

async fn get_call(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<CallSummary>, ServerError> {
    Ok(Json(state.calls.summary(&session_id).await?))
}

async fn end_call(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.calls.end(&session_id)?;
    tracing::info!(session_id = %session_id, "Call dropped");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_calls(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.store().list();
    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness_check(State(state): State<AppState>) -> Response {
    let sessions = state.calls.active_sessions();
    metrics::set_active_sessions(sessions);

    if !state.collaborators_ready().await {
        tracing::warn!("LLM backend unavailable, reporting not ready");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "reason": "llm backend unavailable",
                "sessions": sessions,
            })),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "status": "ready",
        "sessions": sessions,
    }))
    .into_response()
}
