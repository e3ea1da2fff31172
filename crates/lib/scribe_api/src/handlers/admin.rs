//! Role management (admin only).

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::UserResponse;

/// `POST /api/admin/users/{user_id}/promote`
pub async fn promote_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.access.promote(claims.sub, user_id).await?;
    let role = state.accounts.role_of(&user).await?;
    Ok(Json(UserResponse::new(user, role)))
}

/// `POST /api/admin/users/{user_id}/demote`
pub async fn demote_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.access.demote(claims.sub, user_id).await?;
    let role = state.accounts.role_of(&user).await?;
    Ok(Json(UserResponse::new(user, role)))
}
