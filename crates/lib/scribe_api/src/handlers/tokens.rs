//! Token refresh and validation.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{AccessTokenResponse, RefreshRequest, ValidateRequest, ValidateResponse};

/// `POST /api/auth/refresh`: new access token, the refresh token is kept.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<AccessTokenResponse>> {
    let access = state.accounts.refresh_session(&body.refresh_token).await?;
    Ok(Json(access.into()))
}

/// `POST /api/auth/validate`: verify an access token and echo its claims.
pub async fn validate_handler(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> AppResult<Json<ValidateResponse>> {
    let claims = state.accounts.tokens().authenticate(&body.token).await?;
    Ok(Json(ValidateResponse {
        valid: true,
        user_id: claims.sub,
        role: claims.role,
        expires_at: claims.exp,
    }))
}
