//! User and role directory abstractions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::StoreResult;
use crate::models::auth::{NewUserRecord, ProfileUpdate, Role, User};

/// Outcome of a demotion that must not leave the platform without an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demotion {
    Demoted,
    /// Target no longer holds the admin role (or no longer exists).
    NotAnAdmin,
    /// Target is the only remaining admin.
    LastAdmin,
}

/// Resolves role ids to the closed [`Role`] enumeration and back.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// `None` for ids that are not a known role.
    async fn role_by_id(&self, id: Uuid) -> StoreResult<Option<Role>>;

    /// `None` when the role has not been seeded.
    async fn role_id(&self, role: Role) -> StoreResult<Option<Uuid>>;
}

/// Store of user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new account. Duplicate email or username surface as
    /// `StoreError::Conflict` naming the violated constraint.
    async fn create(&self, record: NewUserRecord) -> StoreResult<User>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Look a user up by the digest of an outstanding reset token.
    async fn find_by_reset_token(&self, token_hash: &str) -> StoreResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> StoreResult<bool>;

    async fn username_exists(&self, username: &str) -> StoreResult<bool>;

    /// Apply a partial profile update, returning the updated user.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Store the new password hash and clear the reset token, but only while
    /// `token_hash` is still the user's outstanding token. Returns `false`
    /// when the token was already consumed.
    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> StoreResult<bool>;

    /// Unconditional role change. Returns `false` when the user is missing.
    async fn update_role(&self, id: Uuid, role_id: Uuid) -> StoreResult<bool>;

    /// Move `id` from `admin_role_id` to `user_role_id` unless that would
    /// leave zero admins. Check and write happen atomically.
    async fn demote_guarded(
        &self,
        id: Uuid,
        admin_role_id: Uuid,
        user_role_id: Uuid,
    ) -> StoreResult<Demotion>;

    async fn admin_count(&self, admin_role_id: Uuid) -> StoreResult<i64>;

    async fn user_count(&self) -> StoreResult<i64>;

    /// Returns `false` when the user is missing.
    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<bool>;
}
