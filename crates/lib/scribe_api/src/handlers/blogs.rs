//! Blog post handlers.

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::{Extension, Json};
use scribe_core::blogs::list_query;
use scribe_core::images::UploadedImage;
use scribe_core::models::blog::{Blog, BlogUpdate, NewBlog, Page};
use uuid::Uuid;

use super::current_user;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{BlogListQuery, BlogSearchQuery, MessageResponse};

/// `GET /api/blogs?page=&page_size=&sort=&tag=`
pub async fn list_handler(
    State(state): State<AppState>,
    Query(q): Query<BlogListQuery>,
) -> AppResult<Json<Page<Blog>>> {
    let query = list_query(q.page, q.page_size, q.sort, q.tag);
    Ok(Json(state.blogs.list(&query).await?))
}

/// `POST /api/blogs`
///
/// Accepts a JSON body, or `multipart/form-data` with `title`, `content`,
/// `tags` (repeated or comma separated), `image_urls` and `images` files.
pub async fn create_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    request: Request,
) -> AppResult<(StatusCode, Json<Blog>)> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let blog = if is_multipart {
        let form = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        let (new, uploads) = read_blog_form(form).await?;
        state.blogs.create_with_images(claims.sub, new, uploads).await?
    } else {
        let Json(new) = Json::<NewBlog>::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        state.blogs.create(claims.sub, new).await?
    };
    Ok((StatusCode::CREATED, Json(blog)))
}

fn form_error(e: MultipartError) -> AppError {
    AppError::Validation(e.body_text())
}

async fn read_blog_form(mut form: Multipart) -> AppResult<(NewBlog, Vec<UploadedImage>)> {
    let mut new = NewBlog::default();
    let mut uploads = Vec::new();
    while let Some(field) = form.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(form_error)?;
                // Browsers send an empty part for an untouched file input.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                uploads.push(UploadedImage {
                    file_name,
                    data: data.to_vec(),
                });
            }
            "title" => new.title = field.text().await.map_err(form_error)?,
            "content" => new.content = field.text().await.map_err(form_error)?,
            "tags" => {
                let text = field.text().await.map_err(form_error)?;
                new.tags.extend(text.split(',').map(str::to_string));
            }
            "image_urls" => new.image_urls.push(field.text().await.map_err(form_error)?),
            _ => {}
        }
    }
    Ok((new, uploads))
}

/// `GET /api/blogs/search?title=&author=`
pub async fn search_handler(
    State(state): State<AppState>,
    Query(q): Query<BlogSearchQuery>,
) -> AppResult<Json<Vec<Blog>>> {
    let blogs = state
        .blogs
        .search(q.title.as_deref(), q.author.as_deref())
        .await?;
    Ok(Json(blogs))
}

/// `GET /api/blogs/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Blog>> {
    Ok(Json(state.blogs.get(id).await?))
}

/// `PUT /api/blogs/{id}`
pub async fn update_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<BlogUpdate>,
) -> AppResult<Json<Blog>> {
    Ok(Json(state.blogs.update(id, claims.sub, body).await?))
}

/// `DELETE /api/blogs/{id}`: author or admin.
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let (_, role) = current_user(&state, claims.sub).await?;
    state.blogs.delete(id, claims.sub, role).await?;
    Ok(Json(MessageResponse::new("Blog deleted")))
}

/// `POST /api/blogs/{id}/like`
pub async fn like_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Blog>> {
    Ok(Json(state.blogs.like(id, claims.sub).await?))
}

/// `POST /api/blogs/{id}/dislike`
pub async fn dislike_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Blog>> {
    Ok(Json(state.blogs.dislike(id, claims.sub).await?))
}

/// `POST /api/blogs/{id}/share`
pub async fn share_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Blog>> {
    Ok(Json(state.blogs.share(id).await?))
}
