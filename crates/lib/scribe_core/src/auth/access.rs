//! Role changes between `user` and `admin`.
//!
//! Guards run in a fixed order and the first failing one decides the error:
//! self-action, actor existence, actor privilege, target existence, then the
//! operation-specific checks and finally role resolution.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::directory::{Demotion, RoleDirectory, UserDirectory};
use super::{AuthError, AuthResult};
use crate::models::auth::{Role, User};

#[derive(Clone)]
pub struct AccessControl {
    users: Arc<dyn UserDirectory>,
    roles: Arc<dyn RoleDirectory>,
}

impl AccessControl {
    pub fn new(users: Arc<dyn UserDirectory>, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { users, roles }
    }

    /// Resolve the user's role id. Unknown ids resolve to `None`.
    pub async fn resolve_role(&self, user: &User) -> AuthResult<Option<Role>> {
        Ok(self.roles.role_by_id(user.role_id).await?)
    }

    /// Load `user_id` and require that it currently holds the admin role.
    pub async fn require_admin(&self, user_id: Uuid) -> AuthResult<User> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::ActorNotFound)?;
        if self.resolve_role(&user).await? != Some(Role::Admin) {
            return Err(AuthError::InsufficientPrivilege);
        }
        Ok(user)
    }

    /// Checks shared by promote and demote, returning the target.
    async fn authorize(&self, acting: Uuid, target: Uuid) -> AuthResult<User> {
        if acting == target {
            return Err(AuthError::SelfActionForbidden);
        }
        self.require_admin(acting).await?;
        self.users
            .find_by_id(target)
            .await?
            .ok_or(AuthError::TargetNotFound)
    }

    async fn role_id(&self, role: Role) -> AuthResult<Uuid> {
        self.roles
            .role_id(role)
            .await?
            .ok_or(AuthError::RoleNotConfigured(role))
    }

    async fn reload(&self, id: Uuid) -> AuthResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::TargetNotFound)
    }

    /// Grant the admin role to `target`.
    pub async fn promote(&self, acting: Uuid, target: Uuid) -> AuthResult<User> {
        let user = self.authorize(acting, target).await?;
        if self.resolve_role(&user).await? == Some(Role::Admin) {
            return Err(AuthError::AlreadyAdmin);
        }
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }
        let admin_role_id = self.role_id(Role::Admin).await?;
        if !self.users.update_role(target, admin_role_id).await? {
            return Err(AuthError::TargetNotFound);
        }
        info!(acting = %acting, target = %target, "user promoted to admin");
        self.reload(target).await
    }

    /// Return `target` to the user role. The last admin cannot be demoted.
    pub async fn demote(&self, acting: Uuid, target: Uuid) -> AuthResult<User> {
        let user = self.authorize(acting, target).await?;
        if self.resolve_role(&user).await? != Some(Role::Admin) {
            return Err(AuthError::NotAnAdmin);
        }
        let admin_role_id = self.role_id(Role::Admin).await?;
        if self.users.admin_count(admin_role_id).await? <= 1 {
            return Err(AuthError::LastAdminProtected);
        }
        let user_role_id = self.role_id(Role::User).await?;
        match self
            .users
            .demote_guarded(target, admin_role_id, user_role_id)
            .await?
        {
            Demotion::Demoted => {}
            Demotion::NotAnAdmin => return Err(AuthError::NotAnAdmin),
            Demotion::LastAdmin => return Err(AuthError::LastAdminProtected),
        }
        info!(acting = %acting, target = %target, "admin demoted to user");
        self.reload(target).await
    }
}
