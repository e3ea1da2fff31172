//! OAuth link database queries.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::OAuthLinkStore;
use crate::db::{StoreResult, bounded};
use crate::models::oauth::{OAuthAccount, OAuthUserInfo};

const LINK_COLUMNS: &str =
    "id, user_id, provider, provider_user_id, email, name, picture, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgOAuthLinkStore {
    pool: PgPool,
}

impl PgOAuthLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthLinkStore for PgOAuthLinkStore {
    async fn find(&self, provider: &str, provider_user_id: &str) -> StoreResult<Option<OAuthAccount>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM oauth_accounts WHERE provider = $1 AND provider_user_id = $2"
        );
        bounded(
            sqlx::query_as::<_, OAuthAccount>(&sql)
                .bind(provider)
                .bind(provider_user_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn create(&self, account: OAuthAccount) -> StoreResult<OAuthAccount> {
        let sql = format!(
            "INSERT INTO oauth_accounts (id, user_id, provider, provider_user_id, email, name, \
             picture, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
             RETURNING {LINK_COLUMNS}"
        );
        bounded(
            sqlx::query_as::<_, OAuthAccount>(&sql)
                .bind(account.id)
                .bind(account.user_id)
                .bind(&account.provider)
                .bind(&account.provider_user_id)
                .bind(&account.email)
                .bind(&account.name)
                .bind(&account.picture)
                .bind(account.created_at)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OAuthAccount>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM oauth_accounts WHERE user_id = $1 ORDER BY created_at"
        );
        bounded(
            sqlx::query_as::<_, OAuthAccount>(&sql)
                .bind(user_id)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn touch(&self, id: Uuid, info: &OAuthUserInfo) -> StoreResult<()> {
        bounded(
            sqlx::query(
                "UPDATE oauth_accounts SET email = $2, name = $3, picture = $4, updated_at = now() \
                 WHERE id = $1",
            )
            .bind(id)
            .bind(&info.email)
            .bind(&info.name)
            .bind(&info.picture)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
