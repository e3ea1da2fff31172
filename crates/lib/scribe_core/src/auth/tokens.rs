//! Token lifecycle: issue, persist, validate, refresh and revoke.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::jwt::TokenCodec;
use super::ledger::TokenLedger;
use super::{AuthError, AuthResult};
use crate::db::StoreError;
use crate::models::auth::{IssuedToken, Role, TokenClaims, TokenKind, TokenPair};

/// Regeneration attempts when a freshly signed token collides in the ledger.
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Issues signed tokens and keeps the ledger in step with them.
#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    ledger: Arc<dyn TokenLedger>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        ledger: Arc<dyn TokenLedger>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            ledger,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    async fn issue_and_store(
        &self,
        user_id: Uuid,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthResult<IssuedToken> {
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let issued = self
                .codec
                .issue(user_id, role, kind, ttl)
                .map_err(|e| AuthError::Internal(e.to_string()))?;
            match self
                .ledger
                .store(kind, user_id, &issued.token, issued.expires_at)
                .await
            {
                Ok(_) => return Ok(issued),
                Err(StoreError::Conflict(_)) => {
                    debug!(%user_id, %kind, attempt, "token digest collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::TokenIssuance(format!(
            "{kind} token collided {MAX_ISSUE_ATTEMPTS} times"
        )))
    }

    /// Issue and persist an access/refresh pair.
    ///
    /// If the refresh token cannot be persisted the call fails as a whole and
    /// the already stored access token is revoked again.
    pub async fn generate_and_store(&self, user_id: Uuid, role: Role) -> AuthResult<TokenPair> {
        let access = self
            .issue_and_store(user_id, role, TokenKind::Access, self.access_ttl)
            .await?;

        match self
            .issue_and_store(user_id, role, TokenKind::Refresh, self.refresh_ttl)
            .await
        {
            Ok(refresh) => Ok(TokenPair { access, refresh }),
            Err(err) => {
                if let Err(revoke_err) = self.ledger.revoke(TokenKind::Access, &access.token).await
                {
                    warn!(%user_id, error = %revoke_err, "failed to revoke orphaned access token");
                }
                warn!(%user_id, error = %err, "refresh token persist failed after access token was stored");
                Err(AuthError::TokenIssuance(err.to_string()))
            }
        }
    }

    /// Issue a new access token. The refresh token is left as is.
    pub async fn refresh_access(&self, user_id: Uuid, role: Role) -> AuthResult<IssuedToken> {
        self.issue_and_store(user_id, role, TokenKind::Access, self.access_ttl)
            .await
    }

    /// A token is valid when the codec accepts it for `kind` and the ledger
    /// still holds it unexpired.
    pub async fn validate(&self, kind: TokenKind, token: &str) -> AuthResult<bool> {
        if self.codec.verify(token, kind).is_err() {
            return Ok(false);
        }
        Ok(self.ledger.exists_and_unexpired(kind, token).await?)
    }

    async fn verified(&self, kind: TokenKind, token: &str) -> AuthResult<TokenClaims> {
        let claims = self.codec.verify(token, kind).map_err(|e| {
            debug!(%kind, reason = %e, "token rejected by codec");
            AuthError::InvalidToken
        })?;
        if !self.ledger.exists_and_unexpired(kind, token).await? {
            debug!(%kind, user_id = %claims.sub, "token not in ledger");
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Authenticate a bearer access token.
    pub async fn authenticate(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verified(TokenKind::Access, token).await
    }

    pub async fn verify_refresh(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verified(TokenKind::Refresh, token).await
    }

    pub async fn revoke_access(&self, token: &str) -> AuthResult<()> {
        Ok(self.ledger.revoke(TokenKind::Access, token).await?)
    }

    pub async fn revoke_refresh(&self, token: &str) -> AuthResult<()> {
        Ok(self.ledger.revoke(TokenKind::Refresh, token).await?)
    }

    /// Revoke every token of a user.
    pub async fn revoke_all(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(self.ledger.revoke_all(user_id).await?)
    }

    pub async fn purge_expired(&self) -> AuthResult<u64> {
        Ok(self.ledger.purge_expired().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::db::StoreResult;
    use crate::memory::MemoryTokenLedger;
    use crate::models::auth::TokenRecord;

    fn service_with(ledger: Arc<dyn TokenLedger>) -> TokenService {
        TokenService::new(
            TokenCodec::new(b"unit-test-secret"),
            ledger,
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    fn service() -> (TokenService, Arc<MemoryTokenLedger>) {
        let ledger = Arc::new(MemoryTokenLedger::default());
        (service_with(ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn issued_pair_validates_by_kind() {
        let (svc, _) = service();
        let pair = svc.generate_and_store(Uuid::now_v7(), Role::User).await.unwrap();

        assert!(svc.validate(TokenKind::Access, &pair.access.token).await.unwrap());
        assert!(svc.validate(TokenKind::Refresh, &pair.refresh.token).await.unwrap());
        assert!(!svc.validate(TokenKind::Refresh, &pair.access.token).await.unwrap());
        assert!(!svc.validate(TokenKind::Access, &pair.refresh.token).await.unwrap());
    }

    #[tokio::test]
    async fn revoked_token_is_rejected_even_though_signature_is_valid() {
        let (svc, _) = service();
        let user = Uuid::now_v7();
        let pair = svc.generate_and_store(user, Role::User).await.unwrap();

        svc.revoke_access(&pair.access.token).await.unwrap();
        assert!(!svc.validate(TokenKind::Access, &pair.access.token).await.unwrap());
        assert!(matches!(
            svc.authenticate(&pair.access.token).await,
            Err(AuthError::InvalidToken)
        ));
        // Idempotent.
        svc.revoke_access(&pair.access.token).await.unwrap();
    }

    #[tokio::test]
    async fn expired_token_still_in_ledger_is_rejected() {
        let (svc, ledger) = service();
        let user = Uuid::now_v7();
        let stale = TokenCodec::new(b"unit-test-secret")
            .issue(user, Role::User, TokenKind::Access, Duration::seconds(-5))
            .unwrap();
        ledger
            .store(TokenKind::Access, user, &stale.token, Utc::now() + Duration::minutes(5))
            .await
            .unwrap();

        assert!(ledger.exists_and_unexpired(TokenKind::Access, &stale.token).await.unwrap());
        assert!(!svc.validate(TokenKind::Access, &stale.token).await.unwrap());
        assert!(matches!(
            svc.authenticate(&stale.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn revoke_all_clears_both_kinds() {
        let (svc, _) = service();
        let user = Uuid::now_v7();
        let first = svc.generate_and_store(user, Role::User).await.unwrap();
        let second = svc.generate_and_store(user, Role::User).await.unwrap();

        assert_eq!(svc.revoke_all(user).await.unwrap(), 4);
        for pair in [first, second] {
            assert!(svc.authenticate(&pair.access.token).await.is_err());
            assert!(svc.verify_refresh(&pair.refresh.token).await.is_err());
        }
    }

    #[tokio::test]
    async fn refresh_does_not_rotate_refresh_token() {
        let (svc, _) = service();
        let user = Uuid::now_v7();
        let pair = svc.generate_and_store(user, Role::User).await.unwrap();

        let claims = svc.verify_refresh(&pair.refresh.token).await.unwrap();
        let access = svc.refresh_access(claims.sub, claims.role).await.unwrap();
        assert_ne!(access.token, pair.access.token);
        assert!(svc.authenticate(&access.token).await.is_ok());
        assert!(svc.verify_refresh(&pair.refresh.token).await.is_ok());
    }

    #[tokio::test]
    async fn never_issued_token_is_uniformly_invalid() {
        let (svc, _) = service();
        let stray = TokenCodec::new(b"unit-test-secret")
            .issue(Uuid::now_v7(), Role::Admin, TokenKind::Access, Duration::minutes(5))
            .unwrap();
        assert!(matches!(
            svc.authenticate(&stray.token).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            svc.authenticate("garbage").await,
            Err(AuthError::InvalidToken)
        ));
    }

    /// Ledger that rejects every refresh-token write.
    #[derive(Default)]
    struct RefreshWriteFails {
        inner: MemoryTokenLedger,
    }

    #[async_trait]
    impl TokenLedger for RefreshWriteFails {
        async fn store(
            &self,
            kind: TokenKind,
            user_id: Uuid,
            token: &str,
            expires_at: DateTime<Utc>,
        ) -> StoreResult<TokenRecord> {
            if kind == TokenKind::Refresh {
                return Err(StoreError::Timeout(crate::db::STORAGE_TIMEOUT));
            }
            self.inner.store(kind, user_id, token, expires_at).await
        }
        async fn exists_and_unexpired(&self, kind: TokenKind, token: &str) -> StoreResult<bool> {
            self.inner.exists_and_unexpired(kind, token).await
        }
        async fn revoke(&self, kind: TokenKind, token: &str) -> StoreResult<()> {
            self.inner.revoke(kind, token).await
        }
        async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64> {
            self.inner.revoke_all(user_id).await
        }
        async fn purge_expired(&self) -> StoreResult<u64> {
            self.inner.purge_expired().await
        }
    }

    #[tokio::test]
    async fn failed_refresh_persist_is_one_error_and_leaves_no_access_token() {
        let ledger = Arc::new(RefreshWriteFails::default());
        let svc = service_with(ledger.clone());
        let user = Uuid::now_v7();

        let err = svc.generate_and_store(user, Role::User).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenIssuance(_)));
        assert_eq!(ledger.inner.len(TokenKind::Access), 0);
    }

    /// Ledger whose first `collisions` writes report a digest conflict.
    struct CollidingLedger {
        inner: MemoryTokenLedger,
        collisions: AtomicUsize,
    }

    #[async_trait]
    impl TokenLedger for CollidingLedger {
        async fn store(
            &self,
            kind: TokenKind,
            user_id: Uuid,
            token: &str,
            expires_at: DateTime<Utc>,
        ) -> StoreResult<TokenRecord> {
            let left = self.collisions.load(Ordering::SeqCst);
            if left > 0 {
                self.collisions.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict("access_tokens_token_hash_key".into()));
            }
            self.inner.store(kind, user_id, token, expires_at).await
        }
        async fn exists_and_unexpired(&self, kind: TokenKind, token: &str) -> StoreResult<bool> {
            self.inner.exists_and_unexpired(kind, token).await
        }
        async fn revoke(&self, kind: TokenKind, token: &str) -> StoreResult<()> {
            self.inner.revoke(kind, token).await
        }
        async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64> {
            self.inner.revoke_all(user_id).await
        }
        async fn purge_expired(&self) -> StoreResult<u64> {
            self.inner.purge_expired().await
        }
    }

    #[tokio::test]
    async fn collision_regenerates_within_bound() {
        let svc = service_with(Arc::new(CollidingLedger {
            inner: MemoryTokenLedger::default(),
            collisions: AtomicUsize::new(MAX_ISSUE_ATTEMPTS - 1),
        }));
        assert!(svc.refresh_access(Uuid::now_v7(), Role::User).await.is_ok());

        let svc = service_with(Arc::new(CollidingLedger {
            inner: MemoryTokenLedger::default(),
            collisions: AtomicUsize::new(MAX_ISSUE_ATTEMPTS),
        }));
        assert!(matches!(
            svc.refresh_access(Uuid::now_v7(), Role::User).await,
            Err(AuthError::TokenIssuance(_))
        ));
    }
}
