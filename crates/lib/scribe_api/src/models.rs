//! Request and response bodies.

use chrono::{DateTime, Utc};
use scribe_core::models::auth::{IssuedToken, Role, TokenPair, User};
use scribe_core::models::blog::BlogSort;
use scribe_core::models::oauth::OAuthAccount;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    pub email_or_username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Public view of a user; never carries hashes or reset state.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub profile_picture: String,
    pub contact_info: String,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(user: User, role: Role) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            profile_picture: user.profile_picture,
            contact_info: user.contact_info,
            role,
            is_active: user.is_active,
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

fn seconds_until(expires_at: DateTime<Utc>) -> i64 {
    (expires_at - Utc::now()).num_seconds().max(0)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: UserResponse,
}

impl TokenResponse {
    pub fn new(tokens: TokenPair, user: UserResponse) -> Self {
        Self {
            expires_in: seconds_until(tokens.access.expires_at),
            access_token: tokens.access.token,
            refresh_token: tokens.refresh.token,
            token_type: TOKEN_TYPE.into(),
            user,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<IssuedToken> for AccessTokenResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            expires_in: seconds_until(token.expires_at),
            access_token: token.token,
            token_type: TOKEN_TYPE.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub user_id: Uuid,
    pub role: Role,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct BlogListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(default)]
    pub sort: BlogSort,
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlogSearchQuery {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub topic: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

/// With `blog_id`, the suggestion is kept on that post (author only) and an
/// empty `content` falls back to the post's body.
#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub blog_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthStartResponse {
    pub auth_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
    /// Set by the provider when the user declined.
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthLinkRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthLoginResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub is_new_user: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkedAccountResponse {
    pub provider: String,
    pub provider_user_id: String,
    pub email: String,
    pub linked_at: DateTime<Utc>,
}

impl From<OAuthAccount> for LinkedAccountResponse {
    fn from(a: OAuthAccount) -> Self {
        Self {
            provider: a.provider,
            provider_user_id: a.provider_user_id,
            email: a.email,
            linked_at: a.created_at,
        }
    }
}
