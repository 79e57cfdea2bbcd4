//! User endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use iblog_common::AppResult;
use iblog_db::entities::user;
use serde::Serialize;

use crate::endpoints::posts::PostResponse;
use crate::extractors::ConfirmedUser;
use crate::middleware::AppState;
use crate::pagination::{Page, PageQuery};

/// User representation on the API. Email and password hash never leave
/// the server.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: String,
    pub last_seen: String,
    pub avatar_hash: Option<String>,
    pub post_count: u64,
    pub follower_count: u64,
    pub following_count: u64,
}

impl UserResponse {
    fn new(u: user::Model, post_count: u64, follower_count: u64, following_count: u64) -> Self {
        Self {
            id: u.id,
            username: u.username,
            name: u.name,
            location: u.location,
            about_me: u.about_me,
            member_since: u.member_since.to_rfc3339(),
            last_seen: u.last_seen.to_rfc3339(),
            avatar_hash: u.avatar_hash,
            post_count,
            follower_count,
            following_count,
        }
    }
}

/// Get one user.
async fn show(
    ConfirmedUser(_current): ConfirmedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let user = state.account_service.get_by_id(&id).await?;
    let post_count = state.post_service.count_by_author(&user.id).await?;
    let follower_count = state.follow_service.follower_count(&user.id).await?;
    let following_count = state.follow_service.following_count(&user.id).await?;

    Ok(Json(UserResponse::new(
        user,
        post_count,
        follower_count,
        following_count,
    )))
}

/// List a user's posts, newest first.
async fn posts(
    ConfirmedUser(_current): ConfirmedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<PostResponse>>> {
    let user = state.account_service.get_by_id(&id).await?;

    let page = query.page();
    let per_page = state.config.app.posts_per_page;
    let paged = state.post_service.by_author(&user.id, page, per_page).await?;

    Ok(Json(Page::build(
        paged,
        &format!("/api/users/{id}/posts/"),
        page,
        per_page,
        PostResponse::from,
    )))
}

/// List posts by the users this user follows, newest first. Includes
/// the user's own posts through the self-follow.
async fn timeline(
    ConfirmedUser(_current): ConfirmedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<PostResponse>>> {
    let user = state.account_service.get_by_id(&id).await?;

    let page = query.page();
    let per_page = state.config.app.posts_per_page;
    let paged = state
        .post_service
        .followed_timeline(&user.id, page, per_page)
        .await?;

    Ok(Json(Page::build(
        paged,
        &format!("/api/users/{id}/timeline/"),
        page,
        per_page,
        PostResponse::from,
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(show))
        .route("/{id}/posts/", get(posts))
        .route("/{id}/timeline/", get(timeline))
}
