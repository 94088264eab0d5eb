use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage_ok: bool,
    pub storage_error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    security(()),
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    match state.storage.ping().await {
        Ok(()) => Ok(Json(HealthResponse { status: "ok", storage_ok: true, storage_error: None })),
        Err(e) => Ok(Json(HealthResponse { status: "ok", storage_ok: false, storage_error: Some(e.to_string()) })),
    }
}
