//! Auth-related database queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::directory::{Demotion, RoleDirectory, UserDirectory};
use crate::db::{StoreResult, bounded};
use crate::models::auth::{NewUserRecord, ProfileUpdate, Role, User};
use crate::uuid::uuidv7;

const USER_COLUMNS: &str = "id, role_id, username, email, password_hash, first_name, last_name, \
     bio, profile_picture, contact_info, is_active, email_verified, reset_token_hash, \
     reset_expires_at, created_at, updated_at";

/// Postgres-backed [`UserDirectory`].
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        bounded(
            sqlx::query_as::<_, User>(&sql)
                .bind(value)
                .fetch_optional(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn create(&self, record: NewUserRecord) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, role_id, username, email, password_hash, first_name, \
             last_name, profile_picture) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {USER_COLUMNS}"
        );
        bounded(
            sqlx::query_as::<_, User>(&sql)
                .bind(uuidv7())
                .bind(record.role_id)
                .bind(&record.username)
                .bind(&record.email)
                .bind(&record.password_hash)
                .bind(&record.first_name)
                .bind(&record.last_name)
                .bind(&record.profile_picture)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        bounded(
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_by("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_by("username", username).await
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> StoreResult<Option<User>> {
        self.find_by("reset_token_hash", token_hash).await
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        bounded(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        bounded(
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)",
            )
            .bind(username)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                bio = COALESCE($4, bio), \
                profile_picture = COALESCE($5, profile_picture), \
                contact_info = COALESCE($6, contact_info), \
                updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        bounded(
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .bind(&update.first_name)
                .bind(&update.last_name)
                .bind(&update.bio)
                .bind(&update.profile_picture)
                .bind(&update.contact_info)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        bounded(
            sqlx::query(
                "UPDATE users SET reset_token_hash = $2, reset_expires_at = $3, \
                 updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> StoreResult<bool> {
        let result = bounded(
            sqlx::query(
                "UPDATE users SET password_hash = $3, reset_token_hash = NULL, \
                 reset_expires_at = NULL, updated_at = now() \
                 WHERE id = $1 AND reset_token_hash = $2",
            )
            .bind(id)
            .bind(token_hash)
            .bind(password_hash)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_role(&self, id: Uuid, role_id: Uuid) -> StoreResult<bool> {
        let result = bounded(
            sqlx::query("UPDATE users SET role_id = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(role_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn demote_guarded(
        &self,
        id: Uuid,
        admin_role_id: Uuid,
        user_role_id: Uuid,
    ) -> StoreResult<Demotion> {
        bounded(async {
            let mut tx = self.pool.begin().await?;
            // Lock every admin row so concurrent demotions serialize on the count.
            let admins = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM users WHERE role_id = $1 FOR UPDATE",
            )
            .bind(admin_role_id)
            .fetch_all(&mut *tx)
            .await?;

            if !admins.contains(&id) {
                tx.rollback().await?;
                return Ok::<_, sqlx::Error>(Demotion::NotAnAdmin);
            }
            if admins.len() <= 1 {
                tx.rollback().await?;
                return Ok(Demotion::LastAdmin);
            }

            sqlx::query("UPDATE users SET role_id = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(user_role_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(Demotion::Demoted)
        })
        .await
    }

    async fn admin_count(&self, admin_role_id: Uuid) -> StoreResult<i64> {
        bounded(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
                .bind(admin_role_id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn user_count(&self) -> StoreResult<i64> {
        bounded(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(&self.pool))
            .await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<bool> {
        let result = bounded(
            sqlx::query("UPDATE users SET is_active = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Postgres-backed [`RoleDirectory`] over the seeded `roles` table.
#[derive(Debug, Clone)]
pub struct PgRoleDirectory {
    pool: PgPool,
}

impl PgRoleDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleDirectory for PgRoleDirectory {
    async fn role_by_id(&self, id: Uuid) -> StoreResult<Option<Role>> {
        let name = bounded(
            sqlx::query_scalar::<_, String>("SELECT name FROM roles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(name.and_then(|n| n.parse().ok()))
    }

    async fn role_id(&self, role: Role) -> StoreResult<Option<Uuid>> {
        bounded(
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE name = $1")
                .bind(role.as_str())
                .fetch_optional(&self.pool),
        )
        .await
    }
}
