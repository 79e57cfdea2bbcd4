//! Comment endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use iblog_common::{AppError, AppResult};
use iblog_db::entities::Permission;

use crate::endpoints::posts::CommentResponse;
use crate::extractors::ConfirmedUser;
use crate::middleware::AppState;
use crate::pagination::{Page, PageQuery};

/// List every comment, newest first.
async fn list(
    ConfirmedUser(_current): ConfirmedUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<CommentResponse>>> {
    let page = query.page();
    let per_page = state.config.app.comments_per_page;
    let paged = state.comment_service.latest(page, per_page).await?;

    Ok(Json(Page::build(
        paged,
        "/api/comments/",
        page,
        per_page,
        CommentResponse::from,
    )))
}

/// Get one comment.
async fn show(
    ConfirmedUser(current): ConfirmedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CommentResponse>> {
    let comment = state.comment_service.get_by_id(&id).await?;

    // Disabled comments stay visible to moderators only.
    if comment.disabled && !current.can(Permission::MODERATE) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(comment.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show))
}
