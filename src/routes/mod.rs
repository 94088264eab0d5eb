pub mod access;
pub mod catalog;
pub mod groups;
pub mod health;
pub mod users;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::User;

/// The caller's own record, which must exist and carry administrator rights.
pub(crate) async fn require_admin(state: &AppState, auth: &AuthUser) -> AppResult<User> {
    match state.access.users().get_by_email(&auth.email).await? {
        Some(user) if user.is_administrator() => Ok(user),
        Some(_) => Err(AppError::forbidden("administrator rights required")),
        None => Err(AppError::forbidden(format!("no portal record for '{}'", auth.email))),
    }
}
