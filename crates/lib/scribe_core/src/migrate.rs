//! Database migration support.
//!
//! Embeds the SQL files under `scribe_core/migrations/` and applies any that
//! have not run yet. Role rows are seeded by the first migration.

use sqlx::PgPool;
use tracing::info;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("./migrations");
    info!(count = migrator.iter().count(), "applying database migrations");
    migrator.run(pool).await
}
