//! HTTP control surface
//!
//! Thin handlers over SyncService; errors are translated into status codes
//! here so the process never crashes on a failed operation.

pub mod ui;

use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::avatar::AvatarState;
use crate::error::Error;
use crate::service::{SnapshotEntry, SyncService};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SyncService>,
    pub avatar: Arc<AvatarState>,
}

impl AppState {
    pub fn new(service: Arc<SyncService>, avatar: Arc<AvatarState>) -> Self {
        Self { service, avatar }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ui::serve_index))
        .route("/static/app.js", get(ui::serve_app_js))
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/snapshots", get(list_snapshots))
        .route("/api/snapshots/:key", delete(delete_snapshot))
        .route("/save", post(save))
        .route("/apply/:key", post(apply))
        .route("/copy/:key", post(copy_to_current))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatusResponse {
    pub connected: bool,
    pub remote: Option<String>,
    pub current_avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotListResponse {
    pub snapshots: Vec<SnapshotEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SaveForm {
    #[serde(default)]
    pub save_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub status: String,
    pub parameters: usize,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub status: String,
    pub key: String,
    pub parameters: usize,
}

/// Translate an operation failure into a user-visible response
fn error_response(err: Error) -> (StatusCode, Json<StatusResponse>) {
    let code = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::RemoteQuery(_) => StatusCode::BAD_GATEWAY,
        Error::DiscoveryTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {err}");
    }
    (
        code,
        Json(StatusResponse {
            status: err.to_string(),
        }),
    )
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "paramvault".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/status
async fn get_status(State(state): State<AppState>) -> Json<ServiceStatusResponse> {
    Json(ServiceStatusResponse {
        connected: state.service.is_connected().await,
        remote: state.service.remote_root().await,
        current_avatar: state.avatar.current().await,
    })
}

/// GET /api/snapshots
async fn list_snapshots(
    State(state): State<AppState>,
) -> Result<Json<SnapshotListResponse>, (StatusCode, Json<StatusResponse>)> {
    match state.service.list().await {
        Ok(snapshots) => Ok(Json(SnapshotListResponse { snapshots })),
        Err(e) => Err(error_response(e)),
    }
}

/// POST /save
async fn save(
    State(state): State<AppState>,
    Form(form): Form<SaveForm>,
) -> Result<Json<SaveResponse>, (StatusCode, Json<StatusResponse>)> {
    match state.service.save(form.save_name).await {
        Ok(parameters) => Ok(Json(SaveResponse {
            status: "saved".to_string(),
            parameters,
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// POST /apply/:key
async fn apply(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApplyResponse>, (StatusCode, Json<StatusResponse>)> {
    match state.service.load(&key).await {
        Ok(parameters) => Ok(Json(ApplyResponse {
            status: "applied".to_string(),
            key,
            parameters,
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// POST /copy/:key
async fn copy_to_current(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<StatusResponse>)> {
    match state.service.copy_to_current(&key).await {
        Ok(()) => Ok(Json(StatusResponse {
            status: "copied".to_string(),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// DELETE /api/snapshots/:key
async fn delete_snapshot(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<StatusResponse>)> {
    match state.service.delete(&key).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(error_response(e)),
    }
}
