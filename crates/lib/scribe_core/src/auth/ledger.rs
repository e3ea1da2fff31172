//! Persistence-backed token ledger.
//!
//! A signed token is only honoured while its digest is present here; deleting
//! the row is what revocation means. Only SHA-256 digests are stored, never
//! the token string itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{StoreResult, bounded};
use crate::models::auth::{TokenKind, TokenRecord};
use crate::uuid::uuidv7;

/// SHA-256 hex digest of a token string.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Store of issued access and refresh tokens.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Record an issued token. A digest collision is `StoreError::Conflict`.
    async fn store(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<TokenRecord>;

    /// Whether the token is recorded and its stored expiry is still ahead.
    async fn exists_and_unexpired(&self, kind: TokenKind, token: &str) -> StoreResult<bool>;

    /// Remove a single token. Unknown tokens are not an error.
    async fn revoke(&self, kind: TokenKind, token: &str) -> StoreResult<()>;

    /// Remove every access and refresh token of a user, returning how many
    /// rows went away.
    async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Drop rows whose expiry has passed.
    async fn purge_expired(&self) -> StoreResult<u64>;
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TokenRow {
    fn into_record(self, kind: TokenKind) -> TokenRecord {
        TokenRecord {
            id: self.id,
            kind,
            user_id: self.user_id,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn table(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => "access_tokens",
        TokenKind::Refresh => "refresh_tokens",
    }
}

/// Postgres-backed ledger over the `access_tokens` / `refresh_tokens` tables.
#[derive(Debug, Clone)]
pub struct PgTokenLedger {
    pool: PgPool,
}

impl PgTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenLedger for PgTokenLedger {
    async fn store(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<TokenRecord> {
        let sql = format!(
            "INSERT INTO {} (id, user_id, token_hash, expires_at) VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, token_hash, expires_at, created_at, updated_at",
            table(kind)
        );
        let row = bounded(
            sqlx::query_as::<_, TokenRow>(&sql)
                .bind(uuidv7())
                .bind(user_id)
                .bind(hash_token(token))
                .bind(expires_at)
                .fetch_one(&self.pool),
        )
        .await?;
        Ok(row.into_record(kind))
    }

    async fn exists_and_unexpired(&self, kind: TokenKind, token: &str) -> StoreResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE token_hash = $1 AND expires_at > now())",
            table(kind)
        );
        bounded(
            sqlx::query_scalar::<_, bool>(&sql)
                .bind(hash_token(token))
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn revoke(&self, kind: TokenKind, token: &str) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE token_hash = $1", table(kind));
        bounded(
            sqlx::query(&sql)
                .bind(hash_token(token))
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64> {
        bounded(async {
            let mut tx = self.pool.begin().await?;
            let access = sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            let refresh = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            tx.commit().await?;
            Ok::<_, sqlx::Error>(access + refresh)
        })
        .await
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        bounded(async {
            let mut removed = 0;
            for kind in [TokenKind::Access, TokenKind::Refresh] {
                let sql = format!("DELETE FROM {} WHERE expires_at <= now()", table(kind));
                removed += sqlx::query(&sql)
                    .execute(&self.pool)
                    .await?
                    .rows_affected();
            }
            Ok::<_, sqlx::Error>(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex_sha256() {
        let h = hash_token("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_token("abd"), h);
    }

    #[test]
    fn kinds_map_to_separate_tables() {
        assert_ne!(table(TokenKind::Access), table(TokenKind::Refresh));
    }
}
