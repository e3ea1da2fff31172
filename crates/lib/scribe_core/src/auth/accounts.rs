//! Account flows: registration, login, session refresh, logout and
//! password reset.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::RngCore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::directory::{RoleDirectory, UserDirectory};
use super::ledger::hash_token;
use super::password::{hash_password, verify_dummy, verify_password};
use super::tokens::TokenService;
use super::validation::{normalize_email, validate_email, validate_password, validate_username};
use super::{AuthError, AuthResult};
use crate::db::StoreError;
use crate::email::Mailer;
use crate::models::auth::{
    IssuedToken, NewUser, NewUserRecord, ProfileUpdate, Role, TokenPair, User,
};

/// Random bytes in a password-reset token (hex-encoded when mailed).
const RESET_TOKEN_BYTES: usize = 32;

/// How long a reset token stays usable.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

const MAX_PROFILE_FIELD_LEN: usize = 2000;

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserDirectory>,
    roles: Arc<dyn RoleDirectory>,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
}

/// Map a unique-constraint violation on insert to the matching duplicate error.
fn duplicate_from_conflict(err: StoreError) -> AuthError {
    match &err {
        StoreError::Conflict(constraint) if constraint.contains("email") => {
            AuthError::DuplicateEmail
        }
        StoreError::Conflict(constraint) if constraint.contains("username") => {
            AuthError::DuplicateUsername
        }
        _ => err.into(),
    }
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        roles: Arc<dyn RoleDirectory>,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            users,
            roles,
            tokens,
            mailer,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Current role of `user`; unknown role ids count as plain users.
    pub async fn role_of(&self, user: &User) -> AuthResult<Role> {
        Ok(self
            .roles
            .role_by_id(user.role_id)
            .await?
            .unwrap_or(Role::User))
    }

    /// Create an account. The very first account on an empty platform
    /// becomes the initial admin.
    pub async fn register(&self, new: NewUser) -> AuthResult<User> {
        let email = normalize_email(&new.email);
        let username = new.username.trim().to_string();
        validate_email(&email)?;
        validate_username(&username)?;
        validate_password(&new.password)?;

        if self.users.email_exists(&email).await? {
            return Err(AuthError::DuplicateEmail);
        }
        if self.users.username_exists(&username).await? {
            return Err(AuthError::DuplicateUsername);
        }

        let role = if self.users.user_count().await? == 0 {
            Role::Admin
        } else {
            Role::User
        };
        let role_id = self
            .roles
            .role_id(role)
            .await?
            .ok_or(AuthError::RoleNotConfigured(role))?;
        let password_hash = hash_password(&new.password)?;

        let user = self
            .users
            .create(NewUserRecord {
                role_id,
                username,
                email,
                password_hash: Some(password_hash),
                first_name: new.first_name.trim().to_string(),
                last_name: new.last_name.trim().to_string(),
                profile_picture: String::new(),
            })
            .await
            .map_err(duplicate_from_conflict)?;

        info!(user_id = %user.id, %role, "user registered");
        Ok(user)
    }

    /// Authenticate by email (or, failing that, username) and password.
    ///
    /// Unknown account, deactivated account, password-less account and wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, identifier: &str, password: &str) -> AuthResult<(User, TokenPair)> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::validation(
                "credentials",
                "Email or username and password are required",
            ));
        }

        let user = match self.users.find_by_email(&normalize_email(identifier)).await? {
            Some(user) => Some(user),
            None => self.users.find_by_username(identifier).await?,
        };
        let Some(user) = user else {
            verify_dummy(password);
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            verify_dummy(password);
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, hash)? || !user.is_active {
            debug!(user_id = %user.id, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let role = self.role_of(&user).await?;
        let tokens = self.tokens.generate_and_store(user.id, role).await?;
        info!(user_id = %user.id, "user logged in");
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new access token. The role embedded in
    /// the new token is read fresh from the directory.
    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<IssuedToken> {
        let claims = self.tokens.verify_refresh(refresh_token).await?;
        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }
        let role = self.role_of(&user).await?;
        self.tokens.refresh_access(user.id, role).await
    }

    /// Revoke every token of the user.
    pub async fn logout(&self, user_id: Uuid) -> AuthResult<()> {
        let revoked = self.tokens.revoke_all(user_id).await?;
        info!(%user_id, revoked, "user logged out");
        Ok(())
    }

    /// Start a password reset. Unknown addresses succeed without side effects.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email);
        validate_email(&email)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            debug!("password reset requested for unknown email");
            return Ok(());
        };
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);

        self.users
            .set_reset_token(user.id, &hash_token(&token), expires_at)
            .await?;
        self.mailer.send_password_reset(&user.email, &token).await?;
        info!(user_id = %user.id, "password reset issued");
        Ok(())
    }

    /// Complete a password reset. The token works once; every session of the
    /// user is revoked afterwards.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::ResetTokenInvalid);
        }

        let digest = hash_token(token);
        let user = self
            .users
            .find_by_reset_token(&digest)
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;
        match user.reset_expires_at {
            Some(expires_at) if Utc::now() <= expires_at => {}
            _ => return Err(AuthError::TokenExpired),
        }

        let password_hash = hash_password(new_password)?;
        if !self
            .users
            .complete_password_reset(user.id, &digest, &password_hash)
            .await?
        {
            return Err(AuthError::ResetTokenInvalid);
        }
        self.tokens.revoke_all(user.id).await?;
        info!(user_id = %user.id, "password reset completed");

        if let Err(e) = self.mailer.send_password_changed(&user.email).await {
            warn!(user_id = %user.id, error = %e, "password change notice not delivered");
        }
        Ok(())
    }

    pub async fn profile(&self, user_id: Uuid) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AuthResult<User> {
        if update.is_empty() {
            return self.profile(user_id).await;
        }
        for (field, value) in [
            ("first_name", &update.first_name),
            ("last_name", &update.last_name),
            ("bio", &update.bio),
            ("profile_picture", &update.profile_picture),
            ("contact_info", &update.contact_info),
        ] {
            if value.as_ref().is_some_and(|v| v.len() > MAX_PROFILE_FIELD_LEN) {
                return Err(AuthError::validation(field, format!("{field} is too long")));
            }
        }
        self.users
            .update_profile(user_id, &update)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenCodec;
    use crate::memory::{
        MemoryMailer, MemoryRoleDirectory, MemoryTokenLedger, MemoryUserDirectory,
    };
    use crate::models::auth::TokenKind;

    struct Fixture {
        users: Arc<MemoryUserDirectory>,
        mailer: Arc<MemoryMailer>,
        accounts: AccountService,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserDirectory::default());
        let roles = Arc::new(MemoryRoleDirectory::seeded());
        let mailer = Arc::new(MemoryMailer::default());
        let tokens = TokenService::new(
            TokenCodec::new(b"accounts-test-secret"),
            Arc::new(MemoryTokenLedger::default()),
            Duration::minutes(15),
            Duration::days(7),
        );
        let accounts = AccountService::new(users.clone(), roles, tokens, mailer.clone());
        Fixture {
            users,
            mailer,
            accounts,
        }
    }

    fn alice() -> NewUser {
        NewUser {
            username: "alice".into(),
            email: "alice@x.com".into(),
            password: "Passw0rd1".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
        }
    }

    fn bob() -> NewUser {
        NewUser {
            username: "bob".into(),
            email: "bob@x.com".into(),
            password: "Passw0rd1".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_then_duplicate_email_fails() {
        let f = fixture();
        let user = f.accounts.register(alice()).await.unwrap();
        assert_eq!(user.email, "alice@x.com");
        assert!(user.is_active);
        assert!(!user.email_verified);

        let again = NewUser {
            username: "alice2".into(),
            ..alice()
        };
        assert!(matches!(
            f.accounts.register(again).await,
            Err(AuthError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn duplicate_username_fails() {
        let f = fixture();
        f.accounts.register(alice()).await.unwrap();
        let again = NewUser {
            email: "other@x.com".into(),
            ..alice()
        };
        assert!(matches!(
            f.accounts.register(again).await,
            Err(AuthError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn concurrent_registrations_keep_emails_unique() {
        let f = fixture();
        let second = NewUser {
            username: "alice2".into(),
            ..alice()
        };
        let (a, b) = tokio::join!(f.accounts.register(alice()), f.accounts.register(second));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let failed = if a.is_err() { a } else { b };
        assert!(matches!(failed, Err(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn stored_password_is_hashed() {
        let f = fixture();
        let user = f.accounts.register(alice()).await.unwrap();
        let stored = f.users.find_by_id(user.id).await.unwrap().unwrap();
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, "Passw0rd1");
        assert!(verify_password("Passw0rd1", &hash).unwrap());
    }

    #[tokio::test]
    async fn first_account_bootstraps_admin() {
        let f = fixture();
        let first = f.accounts.register(alice()).await.unwrap();
        let second = f.accounts.register(bob()).await.unwrap();
        assert_eq!(f.accounts.role_of(&first).await.unwrap(), Role::Admin);
        assert_eq!(f.accounts.role_of(&second).await.unwrap(), Role::User);
    }

    #[tokio::test]
    async fn weak_password_is_rejected() {
        let f = fixture();
        let weak = NewUser {
            password: "password".into(),
            ..alice()
        };
        assert!(matches!(
            f.accounts.register(weak).await,
            Err(AuthError::Validation { field: "password", .. })
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_account_look_the_same() {
        let f = fixture();
        f.accounts.register(alice()).await.unwrap();

        let wrong = f.accounts.login("alice@x.com", "Wrong0ne1").await.unwrap_err();
        let unknown = f
            .accounts
            .login("nonexistent@x.com", "Passw0rd1")
            .await
            .unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn login_by_email_or_username() {
        let f = fixture();
        f.accounts.register(alice()).await.unwrap();

        let (user, pair) = f.accounts.login("Alice@X.com", "Passw0rd1").await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(f.accounts.tokens().authenticate(&pair.access.token).await.is_ok());

        assert!(f.accounts.login("alice", "Passw0rd1").await.is_ok());
    }

    #[tokio::test]
    async fn deactivated_account_cannot_login_or_refresh() {
        let f = fixture();
        let user = f.accounts.register(alice()).await.unwrap();
        let (_, pair) = f.accounts.login("alice", "Passw0rd1").await.unwrap();

        f.users.set_active(user.id, false).await.unwrap();
        assert!(matches!(
            f.accounts.login("alice", "Passw0rd1").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            f.accounts.refresh_session(&pair.refresh.token).await,
            Err(AuthError::AccountDeactivated)
        ));
    }

    #[tokio::test]
    async fn refresh_issues_access_token_with_current_role() {
        let f = fixture();
        f.accounts.register(alice()).await.unwrap();
        f.accounts.register(bob()).await.unwrap();
        let (_, pair) = f.accounts.login("bob", "Passw0rd1").await.unwrap();

        let access = f.accounts.refresh_session(&pair.refresh.token).await.unwrap();
        let claims = f.accounts.tokens().authenticate(&access.token).await.unwrap();
        assert_eq!(claims.role, Role::User);

        assert!(matches!(
            f.accounts.refresh_session(&pair.access.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn logout_revokes_every_token() {
        let f = fixture();
        let user = f.accounts.register(alice()).await.unwrap();
        let (_, pair) = f.accounts.login("alice", "Passw0rd1").await.unwrap();

        f.accounts.logout(user.id).await.unwrap();
        let tokens = f.accounts.tokens();
        assert!(!tokens.validate(TokenKind::Access, &pair.access.token).await.unwrap());
        assert!(!tokens.validate(TokenKind::Refresh, &pair.refresh.token).await.unwrap());
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_is_silent() {
        let f = fixture();
        f.accounts.forgot_password("ghost@x.com").await.unwrap();
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn forgot_password_for_deactivated_account_is_refused() {
        let f = fixture();
        let user = f.accounts.register(alice()).await.unwrap();
        f.users.set_active(user.id, false).await.unwrap();

        assert!(matches!(
            f.accounts.forgot_password("alice@x.com").await,
            Err(AuthError::AccountDeactivated)
        ));
        assert!(f.mailer.sent().is_empty());
        let stored = f.users.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.reset_token_hash.is_none());
    }

    #[tokio::test]
    async fn reset_token_is_single_use_and_revokes_sessions() {
        let f = fixture();
        f.accounts.register(alice()).await.unwrap();
        let (_, pair) = f.accounts.login("alice", "Passw0rd1").await.unwrap();

        f.accounts.forgot_password("alice@x.com").await.unwrap();
        let token = f.mailer.last_reset_token("alice@x.com").unwrap();
        assert_eq!(token.len(), RESET_TOKEN_BYTES * 2);

        f.accounts.reset_password(&token, "N3wPassword").await.unwrap();
        assert!(matches!(
            f.accounts.reset_password(&token, "An0therPass").await,
            Err(AuthError::ResetTokenInvalid)
        ));

        assert!(f.accounts.tokens().authenticate(&pair.access.token).await.is_err());
        assert!(f.accounts.login("alice", "Passw0rd1").await.is_err());
        assert!(f.accounts.login("alice", "N3wPassword").await.is_ok());
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let f = fixture();
        let user = f.accounts.register(alice()).await.unwrap();
        let token = "a".repeat(64);
        f.users
            .set_reset_token(user.id, &hash_token(&token), Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        assert!(matches!(
            f.accounts.reset_password(&token, "N3wPassword").await,
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            f.accounts.reset_password("unknown", "N3wPassword").await,
            Err(AuthError::ResetTokenInvalid)
        ));
    }

    #[tokio::test]
    async fn profile_update_changes_only_given_fields() {
        let f = fixture();
        let user = f.accounts.register(alice()).await.unwrap();
        let updated = f
            .accounts
            .update_profile(
                user.id,
                ProfileUpdate {
                    bio: Some("Writes about rabbits".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio, "Writes about rabbits");
        assert_eq!(updated.first_name, "Alice");
    }
}
