//! Request handlers.

pub mod admin;
pub mod ai;
pub mod blogs;
pub mod comments;
pub mod health;
pub mod oauth;
pub mod tokens;
pub mod users;

use scribe_core::auth::AuthError;
use scribe_core::models::auth::{Role, User};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Load the caller and their current role from the directory. The role in
/// the token may be stale after a promotion or demotion.
pub(crate) async fn current_user(state: &AppState, user_id: Uuid) -> AppResult<(User, Role)> {
    let user = state
        .accounts
        .profile(user_id)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => AppError::Unauthorized("Account no longer exists".into()),
            other => other.into(),
        })?;
    let role = state.accounts.role_of(&user).await?;
    Ok((user, role))
}
