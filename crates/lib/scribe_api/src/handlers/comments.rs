//! Comment handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use scribe_core::models::blog::{Comment, CommentNode};
use uuid::Uuid;

use super::current_user;
use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreateCommentRequest, DeletedResponse, UpdateCommentRequest};

/// `GET /api/blogs/{id}/comments`: nested thread, oldest first.
pub async fn thread_handler(
    State(state): State<AppState>,
    Path(blog_id): Path<Uuid>,
) -> AppResult<Json<Vec<CommentNode>>> {
    Ok(Json(state.comments.thread(blog_id).await?))
}

/// `POST /api/blogs/{id}/comments`
pub async fn create_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(blog_id): Path<Uuid>,
    Json(body): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .comments
        .create(blog_id, claims.sub, &body.content, body.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// `PUT /api/comments/{id}`
pub async fn update_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCommentRequest>,
) -> AppResult<Json<Comment>> {
    Ok(Json(state.comments.update(id, claims.sub, &body.content).await?))
}

/// `DELETE /api/comments/{id}`: removes the comment and its replies.
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    let (_, role) = current_user(&state, claims.sub).await?;
    let deleted = state.comments.delete(id, claims.sub, role).await?;
    Ok(Json(DeletedResponse { deleted }))
}
