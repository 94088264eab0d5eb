use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::require_admin;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::{User, UserCreateRequest, UserUpdateRequest};
use crate::stores::BackfillReport;

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, description = "List user role records", body = [User]))
)]
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<User>>> {
    require_admin(&state, &auth).await?;
    Ok(Json(state.access.users().list().await?))
}

#[utoipa::path(
    get,
    path = "/users/{email}",
    tag = "Users",
    params(("email" = String, Path, description = "User email")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(email): Path<String>,
) -> AppResult<Json<User>> {
    require_admin(&state, &auth).await?;
    let user = state
        .access
        .users()
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user '{email}' not found")))?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid email or unknown group"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    require_admin(&state, &auth).await?;
    payload.groups = state.access.canonical_group_refs(&payload.groups).await?;
    let user = state.access.users().create(payload.into_user()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    put,
    path = "/users/{email}",
    tag = "Users",
    params(("email" = String, Path, description = "User email")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(email): Path<String>,
    Json(mut payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    require_admin(&state, &auth).await?;
    if let Some(groups) = payload.groups.take() {
        payload.groups = Some(state.access.canonical_group_refs(&groups).await?);
    }
    let user = state.access.users().update(&email, payload).await?;
    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/users/{email}",
    tag = "Users",
    params(("email" = String, Path, description = "User email")),
    responses((status = 204, description = "User deleted"))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(email): Path<String>,
) -> AppResult<StatusCode> {
    require_admin(&state, &auth).await?;
    state.access.users().delete(&email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rewrite group title references on every user to group ids.
#[utoipa::path(
    post,
    path = "/users/backfill-group-references",
    tag = "Users",
    responses((status = 200, description = "Backfill report", body = BackfillReport))
)]
pub async fn backfill_group_references(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<BackfillReport>> {
    require_admin(&state, &auth).await?;
    Ok(Json(state.access.backfill_group_references().await?))
}
