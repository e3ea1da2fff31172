//! Social login handlers.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use tracing::warn;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LinkedAccountResponse, OAuthCallbackQuery, OAuthLinkRequest, OAuthLoginResponse,
    OAuthStartResponse, TokenResponse, UserResponse,
};

/// `GET /api/oauth/{provider}/login`: authorization URL plus the state to echo back.
pub async fn login_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Json<OAuthStartResponse>> {
    let (auth_url, state_token) = state.oauth.begin(&provider)?;
    Ok(Json(OAuthStartResponse {
        auth_url,
        state: state_token,
    }))
}

/// `GET /api/oauth/{provider}/callback?code=&state=`
pub async fn callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(q): Query<OAuthCallbackQuery>,
) -> AppResult<Json<OAuthLoginResponse>> {
    if let Some(error) = q.error {
        warn!(%provider, %error, "provider reported an authorization error");
        return Err(AppError::Validation(format!(
            "Authorization was not granted: {error}"
        )));
    }
    let result = state.oauth.complete(&provider, &q.code, &q.state).await?;
    let role = state.accounts.role_of(&result.user).await?;
    Ok(Json(OAuthLoginResponse {
        tokens: TokenResponse::new(result.tokens, UserResponse::new(result.user, role)),
        is_new_user: result.is_new_user,
    }))
}

/// `POST /api/oauth/{provider}/link`
pub async fn link_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(provider): Path<String>,
    Json(body): Json<OAuthLinkRequest>,
) -> AppResult<Json<LinkedAccountResponse>> {
    let account = state
        .oauth
        .link(&provider, &body.code, &body.state, claims.sub)
        .await?;
    Ok(Json(account.into()))
}

/// `GET /api/oauth/accounts`
pub async fn accounts_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<Vec<LinkedAccountResponse>>> {
    let accounts = state.oauth.linked_accounts(claims.sub).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}
