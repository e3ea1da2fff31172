//! Account handlers: registration, login, logout, password reset, profile.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use scribe_core::models::auth::{NewUser, ProfileUpdate};

use super::current_user;
use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest,
    TokenResponse, UserResponse,
};

/// Same reply whether or not the address belongs to an account.
const FORGOT_PASSWORD_REPLY: &str =
    "If an account exists for that email, a password reset link has been sent";

/// `POST /api/users/register`
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state
        .accounts
        .register(NewUser {
            username: body.username,
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
        })
        .await?;
    let role = state.accounts.role_of(&user).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::new(user, role))))
}

/// `POST /api/users/login`
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let (user, tokens) = state
        .accounts
        .login(&body.email_or_username, &body.password)
        .await?;
    let role = state.accounts.role_of(&user).await?;
    Ok(Json(TokenResponse::new(tokens, UserResponse::new(user, role))))
}

/// `POST /api/users/logout`: revokes every token of the caller.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<MessageResponse>> {
    state.accounts.logout(claims.sub).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// `POST /api/users/forgot-password`
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.accounts.forgot_password(&body.email).await?;
    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_REPLY)))
}

/// `POST /api/users/reset-password`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .accounts
        .reset_password(&body.token, &body.new_password)
        .await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset, please log in again",
    )))
}

/// `GET /api/users/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserResponse>> {
    let (user, role) = current_user(&state, claims.sub).await?;
    Ok(Json(UserResponse::new(user, role)))
}

/// `PUT /api/users/profile`
pub async fn update_profile_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Json(body): Json<ProfileUpdate>,
) -> AppResult<Json<UserResponse>> {
    let user = state.accounts.update_profile(claims.sub, body).await?;
    let role = state.accounts.role_of(&user).await?;
    Ok(Json(UserResponse::new(user, role)))
}
