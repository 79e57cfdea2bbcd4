//! Post endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use iblog_common::AppResult;
use iblog_core::{CommentInput, PostInput};
use iblog_db::entities::{comment, post};
use serde::{Deserialize, Serialize};

use crate::extractors::ConfirmedUser;
use crate::middleware::AppState;
use crate::pagination::{Page, PageQuery};

/// Post representation on the API.
#[derive(Serialize)]
pub struct PostResponse {
    pub id: String,
    pub body: String,
    pub body_html: String,
    pub created_at: String,
    pub author_id: String,
}

impl From<post::Model> for PostResponse {
    fn from(p: post::Model) -> Self {
        Self {
            id: p.id,
            body: p.body,
            body_html: p.body_html,
            created_at: p.created_at.to_rfc3339(),
            author_id: p.author_id,
        }
    }
}

/// Comment representation on the API.
#[derive(Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub body: String,
    pub body_html: String,
    pub created_at: String,
    pub disabled: bool,
    pub author_id: String,
    pub post_id: String,
}

impl From<comment::Model> for CommentResponse {
    fn from(c: comment::Model) -> Self {
        Self {
            id: c.id,
            body: c.body,
            body_html: c.body_html,
            created_at: c.created_at.to_rfc3339(),
            disabled: c.disabled,
            author_id: c.author_id,
            post_id: c.post_id,
        }
    }
}

/// Request body for writing or editing a post.
#[derive(Debug, Deserialize)]
pub struct WritePostRequest {
    pub body: String,
}

/// Request body for writing a comment.
#[derive(Debug, Deserialize)]
pub struct WriteCommentRequest {
    pub body: String,
}

/// List all posts, newest first.
async fn list(
    ConfirmedUser(_current): ConfirmedUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<PostResponse>>> {
    let page = query.page();
    let per_page = state.config.app.posts_per_page;
    let paged = state.post_service.timeline(page, per_page).await?;

    Ok(Json(Page::build(
        paged,
        "/api/posts/",
        page,
        per_page,
        PostResponse::from,
    )))
}

/// Get one post.
async fn show(
    ConfirmedUser(_current): ConfirmedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PostResponse>> {
    let post = state.post_service.get_by_id(&id).await?;
    Ok(Json(post.into()))
}

/// Publish a new post.
async fn create(
    ConfirmedUser(current): ConfirmedUser,
    State(state): State<AppState>,
    Json(req): Json<WritePostRequest>,
) -> AppResult<(StatusCode, Json<PostResponse>)> {
    let post = state
        .post_service
        .create(&current.user.id, &current.role, PostInput { body: req.body })
        .await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// Edit a post. Allowed for the author and administrators.
async fn update(
    ConfirmedUser(current): ConfirmedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<WritePostRequest>,
) -> AppResult<Json<PostResponse>> {
    let post = state
        .post_service
        .update(
            &id,
            &current.user.id,
            &current.role,
            PostInput { body: req.body },
        )
        .await?;
    Ok(Json(post.into()))
}

/// List a post's comments, oldest first.
async fn comments(
    ConfirmedUser(_current): ConfirmedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<CommentResponse>>> {
    // 404 for a missing post rather than an empty listing.
    state.post_service.get_by_id(&id).await?;

    let page = query.page();
    let per_page = state.config.app.comments_per_page;
    let paged = state.comment_service.for_post(&id, page, per_page).await?;

    Ok(Json(Page::build(
        paged,
        &format!("/api/posts/{id}/comments/"),
        page,
        per_page,
        CommentResponse::from,
    )))
}

/// Comment on a post.
async fn create_comment(
    ConfirmedUser(current): ConfirmedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<WriteCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let comment = state
        .comment_service
        .create(
            &id,
            &current.user.id,
            &current.role,
            CommentInput { body: req.body },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update))
        .route("/{id}/comments/", get(comments).post(create_comment))
}
