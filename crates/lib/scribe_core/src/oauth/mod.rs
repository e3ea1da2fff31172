//! Social login: provider redirects, callbacks and account linking.
//!
//! A callback resolves to a platform user in three steps: an existing
//! provider link wins, then an account with the same email is linked, and
//! otherwise a new password-less account is created.

pub mod providers;
pub mod queries;
pub mod state;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use self::providers::OAuthProvider;
use self::state::{OAuthStateStore, PendingLogin, generate_state};
use crate::auth::directory::{RoleDirectory, UserDirectory};
use crate::auth::tokens::TokenService;
use crate::auth::validation::normalize_email;
use crate::auth::{AuthError, ErrorKind};
use crate::db::{StoreError, StoreResult};
use crate::models::auth::{NewUserRecord, Role, User};
use crate::models::oauth::{OAuthAccount, OAuthLoginResult, OAuthUserInfo};
use crate::uuid::uuidv7;

const USERNAME_BASE_LEN: usize = 20;
const USERNAME_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Unsupported OAuth provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid or expired OAuth state")]
    InvalidState,

    #[error("Authorization code is required")]
    MissingCode,

    #[error("OAuth account already linked to a user")]
    AlreadyLinked,

    #[error("Provider did not return an email address")]
    MissingEmail,

    #[error("OAuth provider error: {0}")]
    Provider(String),

    #[error("OAuth configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl OAuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OAuthError::UnsupportedProvider(_) => ErrorKind::NotFound,
            OAuthError::InvalidState | OAuthError::MissingCode | OAuthError::MissingEmail => {
                ErrorKind::Validation
            }
            OAuthError::AlreadyLinked | OAuthError::Store(StoreError::Conflict(_)) => {
                ErrorKind::Conflict
            }
            OAuthError::Provider(_) => ErrorKind::Upstream,
            OAuthError::Config(_) => ErrorKind::Internal,
            OAuthError::Auth(e) => e.kind(),
            OAuthError::Store(_) => ErrorKind::Transient,
        }
    }
}

/// Persistence for provider identity links.
#[async_trait]
pub trait OAuthLinkStore: Send + Sync {
    async fn find(&self, provider: &str, provider_user_id: &str) -> StoreResult<Option<OAuthAccount>>;

    /// Insert a link. An identity already linked is `StoreError::Conflict`.
    async fn create(&self, account: OAuthAccount) -> StoreResult<OAuthAccount>;

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OAuthAccount>>;

    /// Refresh the cached profile fields of a link.
    async fn touch(&self, id: Uuid, info: &OAuthUserInfo) -> StoreResult<()>;
}

/// Derive a valid username base from an email or display name.
fn username_base(email: &str, name: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let source = if local.is_empty() { name } else { local };
    let mut base: String = source
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                Some(c.to_ascii_lowercase())
            } else if matches!(c, '.' | '-' | '+' | ' ') {
                Some('_')
            } else {
                None
            }
        })
        .take(USERNAME_BASE_LEN)
        .collect();
    while base.len() < 3 {
        base.push_str("user");
        base.truncate(USERNAME_BASE_LEN);
    }
    base
}

fn username_candidate(base: &str, attempt: usize) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    let suffix: u16 = rand::rng().random_range(1000..10000);
    format!("{base}_{suffix}")
}

#[derive(Clone)]
pub struct OAuthService {
    providers: BTreeMap<String, Arc<dyn OAuthProvider>>,
    states: Arc<OAuthStateStore>,
    links: Arc<dyn OAuthLinkStore>,
    users: Arc<dyn UserDirectory>,
    roles: Arc<dyn RoleDirectory>,
    tokens: TokenService,
}

impl OAuthService {
    pub fn new(
        links: Arc<dyn OAuthLinkStore>,
        users: Arc<dyn UserDirectory>,
        roles: Arc<dyn RoleDirectory>,
        tokens: TokenService,
        states: Arc<OAuthStateStore>,
    ) -> Self {
        Self {
            providers: BTreeMap::new(),
            states,
            links,
            users,
            roles,
            tokens,
        }
    }

    /// Register a provider under its own name.
    pub fn with_provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    /// Names of the configured providers.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    fn provider(&self, name: &str) -> Result<&Arc<dyn OAuthProvider>, OAuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| OAuthError::UnsupportedProvider(name.to_string()))
    }

    fn take_state(&self, provider: &str, state: &str) -> Result<(), OAuthError> {
        match self.states.take(state) {
            Some(pending) if pending.provider == provider => Ok(()),
            _ => Err(OAuthError::InvalidState),
        }
    }

    /// Start an authorization, returning `(authorize_url, state)`.
    pub fn begin(&self, provider: &str) -> Result<(String, String), OAuthError> {
        let p = self.provider(provider)?;
        let state = generate_state();
        let url = p.authorize_url(&state)?;
        self.states.insert(state.clone(), PendingLogin::new(provider));
        Ok((url, state))
    }

    async fn exchange(&self, provider: &str, code: &str, state: &str) -> Result<OAuthUserInfo, OAuthError> {
        let p = self.provider(provider)?;
        if code.trim().is_empty() {
            return Err(OAuthError::MissingCode);
        }
        self.take_state(provider, state)?;
        let info = p.exchange_code(code.trim()).await?;
        if info.provider_user_id.is_empty() {
            return Err(OAuthError::Provider(format!("{provider} returned no user id")));
        }
        Ok(info)
    }

    /// Finish a social login and issue a token pair.
    pub async fn complete(&self, provider: &str, code: &str, state: &str) -> Result<OAuthLoginResult, OAuthError> {
        let info = self.exchange(provider, code, state).await?;

        let (user, is_new_user, needs_link) =
            match self.links.find(provider, &info.provider_user_id).await? {
                Some(link) => {
                    if let Err(e) = self.links.touch(link.id, &info).await {
                        warn!(link_id = %link.id, error = %e, "could not refresh oauth profile");
                    }
                    let user = self
                        .users
                        .find_by_id(link.user_id)
                        .await?
                        .ok_or(AuthError::UserNotFound)?;
                    (user, false, false)
                }
                None => {
                    let email = normalize_email(&info.email);
                    if email.is_empty() {
                        return Err(OAuthError::MissingEmail);
                    }
                    match self.users.find_by_email(&email).await? {
                        Some(user) => (user, false, true),
                        None => {
                            let (user, created) = self.create_user(&info, &email).await?;
                            (user, created, true)
                        }
                    }
                }
            };

        if !user.is_active {
            return Err(AuthError::AccountDeactivated.into());
        }
        if needs_link {
            self.insert_link(provider, &info, user.id).await?;
        }

        let role = self
            .roles
            .role_by_id(user.role_id)
            .await?
            .unwrap_or(Role::User);
        let tokens = self.tokens.generate_and_store(user.id, role).await?;
        info!(user_id = %user.id, provider, is_new_user, "oauth login");
        Ok(OAuthLoginResult {
            user,
            tokens,
            is_new_user,
        })
    }

    /// Bind a provider identity to an already authenticated user.
    pub async fn link(
        &self,
        provider: &str,
        code: &str,
        state: &str,
        user_id: Uuid,
    ) -> Result<OAuthAccount, OAuthError> {
        let info = self.exchange(provider, code, state).await?;
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if self.links.find(provider, &info.provider_user_id).await?.is_some() {
            return Err(OAuthError::AlreadyLinked);
        }
        let account = self.insert_link(provider, &info, user_id).await?;
        info!(%user_id, provider, "oauth account linked");
        Ok(account)
    }

    pub async fn linked_accounts(&self, user_id: Uuid) -> Result<Vec<OAuthAccount>, OAuthError> {
        Ok(self.links.list_for_user(user_id).await?)
    }

    async fn insert_link(
        &self,
        provider: &str,
        info: &OAuthUserInfo,
        user_id: Uuid,
    ) -> Result<OAuthAccount, OAuthError> {
        let now = Utc::now();
        self.links
            .create(OAuthAccount {
                id: uuidv7(),
                user_id,
                provider: provider.to_string(),
                provider_user_id: info.provider_user_id.clone(),
                email: info.email.clone(),
                name: info.name.clone(),
                picture: info.picture.clone(),
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => OAuthError::AlreadyLinked,
                other => other.into(),
            })
    }

    /// Create a password-less account. Returns the user and whether it was
    /// created here (a concurrent callback may have won the race on email).
    async fn create_user(&self, info: &OAuthUserInfo, email: &str) -> Result<(User, bool), OAuthError> {
        let role_id = self
            .roles
            .role_id(Role::User)
            .await?
            .ok_or(AuthError::RoleNotConfigured(Role::User))?;
        let base = username_base(email, &info.name);

        for attempt in 0..USERNAME_ATTEMPTS {
            let username = username_candidate(&base, attempt);
            if self.users.username_exists(&username).await? {
                continue;
            }
            let record = NewUserRecord {
                role_id,
                username,
                email: email.to_string(),
                password_hash: None,
                first_name: info.name.clone(),
                last_name: String::new(),
                profile_picture: info.picture.clone(),
            };
            match self.users.create(record).await {
                Ok(user) => return Ok((user, true)),
                Err(StoreError::Conflict(c)) if c.contains("username") => continue,
                Err(StoreError::Conflict(c)) if c.contains("email") => {
                    let user = self
                        .users
                        .find_by_email(email)
                        .await?
                        .ok_or(AuthError::UserNotFound)?;
                    return Ok((user, false));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::DuplicateUsername.into())
    }
}
