use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::require_admin;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::group::{Group, GroupCreateRequest, GroupUpdateRequest};

#[utoipa::path(
    get,
    path = "/groups",
    tag = "Groups",
    responses((status = 200, description = "List permission groups", body = [Group]))
)]
pub async fn list_groups(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<Group>>> {
    Ok(Json(state.access.groups().list().await?))
}

#[utoipa::path(
    get,
    path = "/groups/{id}",
    tag = "Groups",
    params(("id" = String, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group detail", body = Group),
        (status = 404, description = "Group not found")
    )
)]
pub async fn get_group(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Group>> {
    let group = state
        .access
        .groups()
        .get(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("group '{id}' not found")))?;
    Ok(Json(group))
}

#[utoipa::path(
    post,
    path = "/groups",
    tag = "Groups",
    request_body = GroupCreateRequest,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 403, description = "Administrator rights required"),
        (status = 503, description = "Permission groups list not provisioned")
    )
)]
pub async fn create_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<GroupCreateRequest>,
) -> AppResult<(StatusCode, Json<Group>)> {
    require_admin(&state, &auth).await?;
    let group = state.access.groups().create(payload).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    put,
    path = "/groups/{id}",
    tag = "Groups",
    params(("id" = String, Path, description = "Group id")),
    request_body = GroupUpdateRequest,
    responses(
        (status = 200, description = "Group replaced", body = Group),
        (status = 404, description = "Group not found")
    )
)]
pub async fn update_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<GroupUpdateRequest>,
) -> AppResult<Json<Group>> {
    require_admin(&state, &auth).await?;
    let group = state.access.groups().update(&payload.into_group(id)).await?;
    Ok(Json(group))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}",
    tag = "Groups",
    params(("id" = String, Path, description = "Group id")),
    responses((status = 204, description = "Group deleted"))
)]
pub async fn delete_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    require_admin(&state, &auth).await?;
    state.access.groups().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
