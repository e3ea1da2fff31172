//! Content generation passthrough.

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use scribe_core::ai::ContentGenerator;
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{GenerateRequest, GenerateResponse, SuggestRequest, SuggestResponse};

fn generator(state: &AppState) -> AppResult<Arc<dyn ContentGenerator>> {
    state
        .ai
        .clone()
        .ok_or_else(|| AppError::Unavailable("AI features are not configured".into()))
}

/// `POST /api/ai/generate`
pub async fn generate_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Json(body): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let ai = generator(&state)?;
    let content = ai.generate_post(&body.topic).await?;
    info!(user_id = %claims.sub, model = ai.model(), "generated post");
    Ok(Json(GenerateResponse {
        content,
        model: ai.model().to_string(),
        generated_at: Utc::now(),
    }))
}

/// `POST /api/ai/suggest`
pub async fn suggest_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Json(body): Json<SuggestRequest>,
) -> AppResult<Json<SuggestResponse>> {
    let ai = generator(&state)?;
    let content = match body.blog_id {
        Some(blog_id) => {
            let blog = state.blogs.owned(blog_id, claims.sub).await?;
            if body.content.trim().is_empty() {
                blog.content
            } else {
                body.content
            }
        }
        None => body.content,
    };

    let suggestions = ai.suggest_improvements(&content).await?;
    if let Some(blog_id) = body.blog_id {
        state
            .blogs
            .save_suggestion(blog_id, claims.sub, &suggestions)
            .await?;
    }
    info!(
        user_id = %claims.sub,
        blog_id = ?body.blog_id,
        model = ai.model(),
        "suggested improvements"
    );
    Ok(Json(SuggestResponse {
        suggestions,
        model: ai.model().to_string(),
        generated_at: Utc::now(),
        blog_id: body.blog_id,
    }))
}
