//! Application error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use scribe_core::ai::AiError;
use scribe_core::auth::{AuthError, ErrorKind};
use scribe_core::blogs::BlogError;
use scribe_core::db::StoreError;
use scribe_core::oauth::OAuthError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::ErrorResponse;

const STORE_CONFLICT_MESSAGE: &str = "Request conflicts with existing data";

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Map a domain error kind and its message onto a response variant.
    fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Validation => AppError::Validation(message),
            ErrorKind::Unauthorized => AppError::Unauthorized(message),
            ErrorKind::Forbidden => AppError::Forbidden(message),
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::Upstream => AppError::Upstream(message),
            ErrorKind::Transient => AppError::Unavailable(message),
            ErrorKind::Internal => AppError::Internal(message),
        }
    }

    /// Unique-constraint violations keep the constraint name out of the body.
    fn store_conflict(constraint: &str) -> Self {
        debug!(constraint, "store conflict");
        AppError::Conflict(STORE_CONFLICT_MESSAGE.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests",
            ),
            AppError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "Upstream service failed",
            ),
            AppError::Unavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "Service temporarily unavailable, try again",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        match &self {
            AppError::Internal(detail) => error!(%detail, "internal error"),
            AppError::Upstream(detail) | AppError::Unavailable(detail) => {
                warn!(%detail, status = status.as_u16(), "request failed")
            }
            _ => {}
        }

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        let mut response = (status, body).into_response();
        if let AppError::RateLimited { retry_after } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Store(StoreError::Conflict(c)) => AppError::store_conflict(&c),
            e => AppError::from_kind(e.kind(), e.to_string()),
        }
    }
}

impl From<BlogError> for AppError {
    fn from(e: BlogError) -> Self {
        match e {
            BlogError::Store(StoreError::Conflict(c)) => AppError::store_conflict(&c),
            e => AppError::from_kind(e.kind(), e.to_string()),
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::Store(StoreError::Conflict(c)) => AppError::store_conflict(&c),
            OAuthError::Auth(inner) => inner.into(),
            e => AppError::from_kind(e.kind(), e.to_string()),
        }
    }
}

impl From<AiError> for AppError {
    fn from(e: AiError) -> Self {
        AppError::from_kind(e.kind(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn auth_errors_map_to_documented_statuses() {
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::TokenExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::InsufficientPrivilege), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::TargetNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(AuthError::LastAdminProtected), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::SelfActionForbidden), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::DuplicateEmail), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(AuthError::Store(StoreError::Timeout(std::time::Duration::from_secs(5)))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(AuthError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn blog_and_oauth_errors_map() {
        assert_eq!(status(BlogError::NotOwner("blogs")), StatusCode::FORBIDDEN);
        assert_eq!(
            status(BlogError::AlreadyReacted(scribe_core::models::blog::Reaction::Like)),
            StatusCode::CONFLICT
        );
        assert_eq!(status(OAuthError::AlreadyLinked), StatusCode::CONFLICT);
        assert_eq!(status(OAuthError::Provider("down".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(AiError::EmptyResponse), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn internal_details_do_not_leak() {
        let resp = AppError::Internal("db password is hunter2".into()).into_response();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Internal server error"));
        assert!(!text.contains("hunter2"));
    }

    #[tokio::test]
    async fn store_conflicts_hide_constraint_names() {
        let errors: Vec<AppError> = vec![
            AuthError::Store(StoreError::Conflict("users_reset_token_hash_key".into())).into(),
            BlogError::Store(StoreError::Conflict("blogs_pkey".into())).into(),
            OAuthError::Store(StoreError::Conflict("oauth_accounts_provider_key".into())).into(),
            OAuthError::Auth(AuthError::Store(StoreError::Conflict("users_email_key".into())))
                .into(),
        ];
        for err in errors {
            let resp = err.into_response();
            assert_eq!(resp.status(), StatusCode::CONFLICT);
            let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let text = String::from_utf8(body.to_vec()).unwrap();
            assert!(text.contains(STORE_CONFLICT_MESSAGE));
            assert!(!text.contains("_key"));
        }
    }

    #[test]
    fn rate_limit_sets_retry_after() {
        let resp = AppError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[RETRY_AFTER], "42");
    }
}
