use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::directory::{Demotion, RoleDirectory, UserDirectory};
use crate::auth::ledger::{TokenLedger, hash_token};
use crate::db::{StoreError, StoreResult};
use crate::models::auth::{NewUserRecord, ProfileUpdate, Role, TokenKind, TokenRecord, User};
use crate::uuid::uuidv7;

/// Role ids seeded by the initial migration.
const USER_ROLE_ID: Uuid = Uuid::from_u128(0x018f0000_0000_7000_8000_000000000001);
const ADMIN_ROLE_ID: Uuid = Uuid::from_u128(0x018f0000_0000_7000_8000_000000000002);

fn seeded_role_id(role: Role) -> Uuid {
    match role {
        Role::User => USER_ROLE_ID,
        Role::Admin => ADMIN_ROLE_ID,
    }
}

fn hash_constraint(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => "access_tokens_token_hash_key",
        TokenKind::Refresh => "refresh_tokens_token_hash_key",
    }
}

/// Token ledger keyed by `(kind, digest)`.
#[derive(Debug, Default)]
pub struct MemoryTokenLedger {
    rows: DashMap<(TokenKind, String), TokenRecord>,
}

impl MemoryTokenLedger {
    /// Number of recorded tokens of one kind, expired ones included.
    pub fn len(&self, kind: TokenKind) -> usize {
        self.rows.iter().filter(|r| r.key().0 == kind).count()
    }
}

#[async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn store(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<TokenRecord> {
        let token_hash = hash_token(token);
        match self.rows.entry((kind, token_hash.clone())) {
            Entry::Occupied(_) => Err(StoreError::Conflict(hash_constraint(kind).to_string())),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let record = TokenRecord {
                    id: uuidv7(),
                    kind,
                    user_id,
                    token_hash,
                    expires_at,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn exists_and_unexpired(&self, kind: TokenKind, token: &str) -> StoreResult<bool> {
        Ok(self
            .rows
            .get(&(kind, hash_token(token)))
            .is_some_and(|r| r.expires_at > Utc::now()))
    }

    async fn revoke(&self, kind: TokenKind, token: &str) -> StoreResult<()> {
        self.rows.remove(&(kind, hash_token(token)));
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64> {
        let before = self.rows.len();
        self.rows.retain(|_, r| r.user_id != user_id);
        Ok((before - self.rows.len()) as u64)
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let now = Utc::now();
        let before = self.rows.len();
        self.rows.retain(|_, r| r.expires_at > now);
        Ok((before - self.rows.len()) as u64)
    }
}

/// Role table holding the seeded role ids.
#[derive(Debug, Clone)]
pub struct MemoryRoleDirectory {
    roles: HashMap<Uuid, Role>,
}

impl MemoryRoleDirectory {
    /// Both roles, with the same ids the migration seeds.
    pub fn seeded() -> Self {
        Self::with_roles(&[Role::User, Role::Admin])
    }

    /// Only the given roles; the others resolve to `None`.
    pub fn with_roles(roles: &[Role]) -> Self {
        Self {
            roles: roles.iter().map(|r| (seeded_role_id(*r), *r)).collect(),
        }
    }
}

impl Default for MemoryRoleDirectory {
    fn default() -> Self {
        Self::seeded()
    }
}

#[async_trait]
impl RoleDirectory for MemoryRoleDirectory {
    async fn role_by_id(&self, id: Uuid) -> StoreResult<Option<Role>> {
        Ok(self.roles.get(&id).copied())
    }

    async fn role_id(&self, role: Role) -> StoreResult<Option<Uuid>> {
        Ok(self
            .roles
            .iter()
            .find(|(_, r)| **r == role)
            .map(|(id, _)| *id))
    }
}

/// User accounts behind a single lock, so guarded role changes are atomic.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserDirectory {
    async fn find_where(&self, pred: impl Fn(&User) -> bool) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.values().find(|u| pred(u)).cloned())
    }

    async fn modify(&self, id: Uuid, f: impl FnOnce(&mut User)) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|u| {
            f(u);
            u.updated_at = Utc::now();
            u.clone()
        }))
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create(&self, record: NewUserRecord) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == record.email) {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        if users.values().any(|u| u.username == record.username) {
            return Err(StoreError::Conflict("users_username_key".into()));
        }
        let now = Utc::now();
        let user = User {
            id: uuidv7(),
            role_id: record.role_id,
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
            first_name: record.first_name,
            last_name: record.last_name,
            bio: String::new(),
            profile_picture: record.profile_picture,
            contact_info: String::new(),
            is_active: true,
            email_verified: false,
            reset_token_hash: None,
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_where(|u| u.email == email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_where(|u| u.username == username).await
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> StoreResult<Option<User>> {
        self.find_where(|u| u.reset_token_hash.as_deref() == Some(token_hash))
            .await
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        self.modify(id, |u| update.apply(u)).await
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.id != id && u.reset_token_hash.as_deref() == Some(token_hash))
        {
            return Err(StoreError::Conflict("users_reset_token_hash_key".into()));
        }
        if let Some(user) = users.get_mut(&id) {
            user.reset_token_hash = Some(token_hash.to_string());
            user.reset_expires_at = Some(expires_at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        if user.reset_token_hash.as_deref() != Some(token_hash) {
            return Ok(false);
        }
        user.password_hash = Some(password_hash.to_string());
        user.reset_token_hash = None;
        user.reset_expires_at = None;
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_role(&self, id: Uuid, role_id: Uuid) -> StoreResult<bool> {
        Ok(self.modify(id, |u| u.role_id = role_id).await?.is_some())
    }

    async fn demote_guarded(
        &self,
        id: Uuid,
        admin_role_id: Uuid,
        user_role_id: Uuid,
    ) -> StoreResult<Demotion> {
        let mut users = self.users.write().await;
        let admins = users.values().filter(|u| u.role_id == admin_role_id).count();
        let Some(target) = users.get_mut(&id).filter(|u| u.role_id == admin_role_id) else {
            return Ok(Demotion::NotAnAdmin);
        };
        if admins <= 1 {
            return Ok(Demotion::LastAdmin);
        }
        target.role_id = user_role_id;
        target.updated_at = Utc::now();
        Ok(Demotion::Demoted)
    }

    async fn admin_count(&self, admin_role_id: Uuid) -> StoreResult<i64> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| u.role_id == admin_role_id).count() as i64)
    }

    async fn user_count(&self) -> StoreResult<i64> {
        Ok(self.users.read().await.len() as i64)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<bool> {
        Ok(self.modify(id, |u| u.is_active = active).await?.is_some())
    }
}
