//! Liveness and store reachability.

use axum::Json;
use axum::extract::State;
use scribe_core::db::bounded;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /api/health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = match &state.pool {
        Some(pool) => match bounded(sqlx::query("SELECT 1").execute(pool)).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "database ping failed");
                false
            }
        },
        None => true,
    };
    Json(HealthResponse {
        status: if store_connected { "ok" } else { "degraded" }.into(),
        version: scribe_core::version().into(),
        store_connected,
    })
}
