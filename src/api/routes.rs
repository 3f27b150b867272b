//! API route definitions

use std::path::Path;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::services::ServeDir;

use super::shared::SharedStateHandle;
use super::types::*;

/// Embedded viewer page
const VIEWER_HTML: &str = include_str!("viewer.html");

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Create the API router with all endpoints
pub fn create_router(state: SharedStateHandle, static_dir: &Path) -> Router {
    Router::new()
        // Viewer at root
        .route("/", get(|| async { Html(VIEWER_HTML) }))
        // Status endpoints
        .route("/api/status", get(status_handler))
        .route("/api/status/performance", get(performance_handler))
        // Regeneration control
        .route("/api/regeneration", get(get_regeneration).put(update_regeneration))
        .route("/api/regeneration/toggle", post(toggle_regeneration))
        // Tracking inspection
        .route("/api/tracking/mask", get(tracking_mask))
        .route("/api/tracking/skeleton", get(tracking_skeleton))
        // WebSocket endpoint for frames and events
        .route("/ws", get(super::websocket::ws_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

// ============================================================================
// Status Handlers
// ============================================================================

async fn status_handler(State(state): State<SharedStateHandle>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        tracker_ready: state.pipeline.tracker_ready(),
        auto_regenerate: state.pipeline.gate().is_auto_regenerate(),
        connected_clients: state.pipeline.bus().subscriber_count(),
    })
}

async fn performance_handler(State(state): State<SharedStateHandle>) -> Json<PerformanceResponse> {
    Json(PerformanceResponse {
        tracking: state.pipeline.tracking_stats(),
        generation: state.pipeline.generation_stats(),
        counters: state.pipeline.counters(),
    })
}

// ============================================================================
// Regeneration Handlers
// ============================================================================

fn regeneration_response(state: &SharedStateHandle) -> Json<RegenerationResponse> {
    Json(RegenerationResponse {
        status: state.pipeline.gate().status(Instant::now()),
    })
}

async fn get_regeneration(State(state): State<SharedStateHandle>) -> Json<RegenerationResponse> {
    regeneration_response(&state)
}

async fn update_regeneration(
    State(state): State<SharedStateHandle>,
    Json(req): Json<RegenerationUpdateRequest>,
) -> Json<RegenerationResponse> {
    state.set_auto_regenerate(req.auto_regenerate);
    regeneration_response(&state)
}

async fn toggle_regeneration(State(state): State<SharedStateHandle>) -> Json<RegenerationResponse> {
    state.toggle_auto_regenerate();
    regeneration_response(&state)
}

// ============================================================================
// Tracking Handlers
// ============================================================================

fn png_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

fn not_found(msg: &str) -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError::new(msg)))
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<ApiError>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError::new(e.to_string())))
}

async fn tracking_mask(State(state): State<SharedStateHandle>) -> ApiResult<Response> {
    let snapshot = state
        .pipeline
        .latest_tracking()
        .ok_or_else(|| not_found("No frame tracked yet"))?;
    let params = state.pipeline.config().mask;
    let png = tokio::task::spawn_blocking(move || snapshot.mask_png(&params))
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| not_found("No segmentation mask for the latest frame"))?;
    Ok(png_response(png))
}

async fn tracking_skeleton(State(state): State<SharedStateHandle>) -> ApiResult<Response> {
    let snapshot = state
        .pipeline
        .latest_tracking()
        .ok_or_else(|| not_found("No frame tracked yet"))?;
    let png = tokio::task::spawn_blocking(move || snapshot.skeleton_png())
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;
    Ok(png_response(png))
}
