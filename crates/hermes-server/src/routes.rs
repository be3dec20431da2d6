use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::dto::{HealthResponse, SnapshotResponse, StatusResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub const UNAVAILABLE_MESSAGE: &str = "Data is not available at the moment.";

/// Build the full router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/data", get(get_data))
        .route("/api/status", get(get_status))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/data",
    responses(
        (status = 200, description = "Latest snapshot", body = SnapshotResponse),
        (status = 503, description = "No snapshot exists yet", body = String, content_type = "text/plain"),
        (status = 500, description = "Snapshot store unreachable", body = String, content_type = "text/plain"),
    ),
    tag = "data"
)]
pub async fn get_data(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    match state.snapshots.get_snapshot().await? {
        Some(snapshot) => Ok(axum::Json(SnapshotResponse::from(snapshot.as_ref())).into_response()),
        None => {
            tracing::debug!("Snapshot requested before any data was stored");
            Ok((StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_MESSAGE).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Refresh run state", body = StatusResponse),
    ),
    tag = "system"
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(StatusResponse::new(state.runs.status(), state.catalog.len()))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.snapshot_repo().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(HealthResponse {
                status: "healthy",
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(HealthResponse {
                    status: "unhealthy",
                    database: "error",
                }),
            )
        }
    }
}
