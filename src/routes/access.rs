use axum::extract::{Path, Query, State};
use axum::Json;

use super::require_admin;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::access::{AccessSummary, CanSeeQuery, CanSeeResponse};
use crate::models::user::{Role, User};
use crate::navigation::{self, NavigationEntry};
use crate::permissions::{EffectivePermissions, PermissionMap};

#[utoipa::path(
    get,
    path = "/access/me",
    tag = "Access",
    responses(
        (status = 200, description = "Caller's resolved permissions", body = AccessSummary)
    )
)]
pub async fn my_access(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<AccessSummary>> {
    // no record means no permissions
    let (user, effective) = state
        .access
        .effective_by_email(&auth.email)
        .await?
        .unwrap_or_else(|| {
            (
                User::new(auth.email.as_str(), Role::default()),
                EffectivePermissions::Granted(PermissionMap::new()),
            )
        });
    Ok(Json(AccessSummary::new(user, effective)))
}

#[utoipa::path(
    get,
    path = "/access/me/can-see",
    tag = "Access",
    params(CanSeeQuery),
    responses((status = 200, description = "Visibility decision", body = CanSeeResponse))
)]
pub async fn can_see(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CanSeeQuery>,
) -> Json<CanSeeResponse> {
    let resource = query.resource.filter(|r| !r.trim().is_empty());
    let visible = state.access.can_see_email(&auth.email, resource.as_deref()).await;
    Json(CanSeeResponse { resource, visible })
}

#[utoipa::path(
    get,
    path = "/access/me/navigation",
    tag = "Access",
    responses((status = 200, description = "Navigation entries the caller may see", body = [NavigationEntry]))
)]
pub async fn my_navigation(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<NavigationEntry>>> {
    let entries = match state.access.users().get_by_email(&auth.email).await? {
        Some(user) => state.access.visible_navigation(&user).await,
        None => navigation::entries()
            .iter()
            .filter(|entry| entry.resource.is_none())
            .copied()
            .collect(),
    };
    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/access/users/{email}",
    tag = "Access",
    params(("email" = String, Path, description = "User email")),
    responses(
        (status = 200, description = "Resolved permissions for a user", body = AccessSummary),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_access(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(email): Path<String>,
) -> AppResult<Json<AccessSummary>> {
    require_admin(&state, &auth).await?;
    let (user, effective) = state
        .access
        .effective_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user '{email}' not found")))?;
    Ok(Json(AccessSummary::new(user, effective)))
}
