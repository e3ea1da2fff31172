//! Authentication and authorization logic.
//!
//! Provides password hashing, the signed-token codec, the token ledger, the
//! user and role directories, and the services built on top of them:
//! token lifecycle ([`tokens`]), promotion/demotion ([`access`]) and account
//! flows ([`accounts`]).

pub mod access;
pub mod accounts;
pub mod directory;
pub mod jwt;
pub mod ledger;
pub mod password;
pub mod queries;
pub mod tokens;
pub mod validation;

use thiserror::Error;

use crate::db::StoreError;
use crate::email::MailError;
use crate::models::auth::Role;

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    /// Storage or another local dependency is unavailable; retry later.
    Transient,
    /// An external provider (OAuth, generative model) failed.
    Upstream,
    Internal,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Any bearer/refresh token failure. Deliberately does not say why.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Reset token has expired")]
    TokenExpired,

    #[error("Reset token is invalid")]
    ResetTokenInvalid,

    #[error("Only admins can change user roles")]
    InsufficientPrivilege,

    #[error("Acting admin not found")]
    ActorNotFound,

    #[error("Target user not found")]
    TargetNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Admins cannot change their own role")]
    SelfActionForbidden,

    #[error("User is already an admin")]
    AlreadyAdmin,

    #[error("Cannot promote an inactive user")]
    InactiveUser,

    #[error("User is not an admin")]
    NotAnAdmin,

    #[error("Cannot demote the last admin")]
    LastAdminProtected,

    #[error("Role not configured: {0}")]
    RoleNotConfigured(Role),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Token issuance failed: {0}")]
    TokenIssuance(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Mail delivery failed: {0}")]
    Mail(#[from] MailError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::TokenExpired => {
                ErrorKind::Unauthorized
            }
            AuthError::InsufficientPrivilege => ErrorKind::Forbidden,
            AuthError::ActorNotFound | AuthError::TargetNotFound | AuthError::UserNotFound => {
                ErrorKind::NotFound
            }
            AuthError::SelfActionForbidden
            | AuthError::AlreadyAdmin
            | AuthError::InactiveUser
            | AuthError::NotAnAdmin
            | AuthError::LastAdminProtected
            | AuthError::DuplicateEmail
            | AuthError::DuplicateUsername
            | AuthError::AccountDeactivated
            | AuthError::ResetTokenInvalid
            | AuthError::Validation { .. } => ErrorKind::Validation,
            AuthError::Store(StoreError::Conflict(_)) => ErrorKind::Conflict,
            AuthError::TokenIssuance(_)
            | AuthError::Store(_)
            | AuthError::Mail(_) => ErrorKind::Transient,
            AuthError::RoleNotConfigured(_) | AuthError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_and_token_errors_are_unauthorized() {
        assert_eq!(AuthError::InvalidCredentials.kind(), ErrorKind::Unauthorized);
        assert_eq!(AuthError::InvalidToken.kind(), ErrorKind::Unauthorized);
        assert_eq!(AuthError::TokenExpired.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn role_guard_errors_are_validation() {
        for err in [
            AuthError::SelfActionForbidden,
            AuthError::AlreadyAdmin,
            AuthError::NotAnAdmin,
            AuthError::LastAdminProtected,
        ] {
            assert_eq!(err.kind(), ErrorKind::Validation, "{err}");
        }
        assert_eq!(AuthError::InsufficientPrivilege.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn store_timeouts_are_transient() {
        let err = AuthError::from(StoreError::Timeout(crate::db::STORAGE_TIMEOUT));
        assert_eq!(err.kind(), ErrorKind::Transient);
        let err = AuthError::from(StoreError::Conflict("users_email_key".into()));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
