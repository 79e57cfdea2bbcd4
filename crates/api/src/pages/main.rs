//! Timeline, post and moderation pages.

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use iblog_common::AppResult;
use iblog_core::{CommentInput, PostInput};
use iblog_db::entities::{Permission, comment, user};
use maud::{Markup, PreEscaped, html};
use serde::Deserialize;

use crate::extractors::MaybeAuthUser;
use crate::middleware::{AppState, CurrentUser};
use crate::pages::WebUser;
use crate::pages::layout::{avatar_url, base, error_banner, pager, post_item};

/// Query parameters for the home timeline.
#[derive(Debug, Default, Deserialize)]
struct IndexQuery {
    #[serde(default)]
    page: Option<u64>,
    /// Show only posts from followed users.
    #[serde(default)]
    followed: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct PostForm {
    body: String,
}

#[derive(Debug, Deserialize)]
struct CommentForm {
    body: String,
}

#[derive(Debug, Default, Deserialize)]
struct PageParam {
    #[serde(default)]
    page: Option<u64>,
}

/// Home page: timeline plus a composer for accounts that may write.
async fn index(
    MaybeAuthUser(current): MaybeAuthUser,
    State(state): State<AppState>,
    Query(query): Query<IndexQuery>,
) -> AppResult<Markup> {
    render_index(current.as_ref(), &state, &query, None).await
}

async fn render_index(
    current: Option<&CurrentUser>,
    state: &AppState,
    query: &IndexQuery,
    error: Option<&str>,
) -> AppResult<Markup> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = state.config.app.posts_per_page;

    let show_followed = query.followed == Some(1) && current.is_some();
    let paged = match (show_followed, current) {
        (true, Some(current)) => {
            state
                .post_service
                .followed_timeline_with_authors(&current.user.id, page, per_page)
                .await?
        }
        _ => state.post_service.timeline_with_authors(page, per_page).await?,
    };

    let base_path = if show_followed { "/?followed=1" } else { "/" };
    let content = html! {
        @if let Some(current) = current {
            h1 { "Hello, " (current.user.username) "!" }
            @if !current.user.confirmed {
                p .notice {
                    "You have not confirmed your account yet. "
                    a href="/auth/confirm" { "Resend the confirmation email" }
                }
            }
            @if current.can(Permission::WRITE) {
                (error_banner(error))
                form method="post" action="/" {
                    textarea name="body" rows="4" cols="60"
                        placeholder="What's on your mind?" {}
                    br;
                    button type="submit" { "Submit" }
                }
            }
            nav .tabs {
                @if show_followed {
                    a href="/" { "All" } " | " strong { "Followed" }
                } @else {
                    strong { "All" } " | " a href="/?followed=1" { "Followed" }
                }
            }
        } @else {
            h1 { "Hello, Stranger!" }
            p { a href="/auth/register" { "Register" } " to start blogging." }
        }
        @for (post, author) in &paged.items {
            (post_item(post, author.as_ref()))
        }
        (pager(base_path, page, per_page, paged.total))
    };

    Ok(base("Home", current, content))
}

/// Publish a post from the home page composer.
async fn create_post(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let result = state
        .post_service
        .create(&current.user.id, &current.role, PostInput { body: form.body })
        .await;

    match result {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(e) => {
            let page = render_index(
                Some(&current),
                &state,
                &IndexQuery::default(),
                Some(&e.to_string()),
            )
            .await?;
            Ok(page.into_response())
        }
    }
}

/// Single post page with its comments.
async fn show_post(
    MaybeAuthUser(current): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageParam>,
) -> AppResult<Markup> {
    render_post_page(current.as_ref(), &state, &id, query.page.unwrap_or(1).max(1), None).await
}

async fn render_post_page(
    current: Option<&CurrentUser>,
    state: &AppState,
    post_id: &str,
    page: u64,
    error: Option<&str>,
) -> AppResult<Markup> {
    let post = state.post_service.get_by_id(post_id).await?;
    let author = state.account_service.get_by_id(&post.author_id).await.ok();

    let per_page = state.config.app.comments_per_page;
    let comments = state
        .comment_service
        .for_post_with_authors(post_id, page, per_page)
        .await?;

    let can_moderate = current.is_some_and(|c| c.can(Permission::MODERATE));
    let content = html! {
        (post_item(&post, author.as_ref()))
        h2 { "Comments" }
        @if let Some(current) = current {
            @if current.can(Permission::COMMENT) {
                (error_banner(error))
                form method="post" action={ "/post/" (post.id) } {
                    textarea name="body" rows="3" cols="60"
                        placeholder="Write a comment" {}
                    br;
                    button type="submit" { "Submit" }
                }
            }
        }
        @for (comment, comment_author) in &comments.items {
            (comment_item(comment, comment_author.as_ref(), can_moderate))
        }
        (pager(&format!("/post/{}", post.id), page, per_page, comments.total))
    };

    Ok(base("Post", current, content))
}

/// One comment in a listing. Disabled comments show a notice instead
/// of the body unless the viewer can moderate.
fn comment_item(
    comment: &comment::Model,
    author: Option<&user::Model>,
    viewer_can_moderate: bool,
) -> Markup {
    html! {
        article .comment {
            header {
                @if let Some(author) = author {
                    img src=(avatar_url(author, 24)) alt="avatar" width="24" height="24";
                    " "
                    a href={ "/user/" (author.username) } { (author.username) }
                } @else {
                    span { "deleted user" }
                }
                " "
                time datetime=(comment.created_at.to_rfc3339()) {
                    (comment.created_at.format("%Y-%m-%d %H:%M"))
                }
            }
            @if comment.disabled {
                p .disabled { em { "This comment has been disabled by a moderator." } }
                @if viewer_can_moderate {
                    div .comment-body { (PreEscaped(&comment.body_html)) }
                }
            } @else {
                div .comment-body { (PreEscaped(&comment.body_html)) }
            }
        }
    }
}

/// Comment on a post.
async fn create_comment(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let result = state
        .comment_service
        .create(&id, &current.user.id, &current.role, CommentInput { body: form.body })
        .await;

    match result {
        Ok(_) => Ok(Redirect::to(&format!("/post/{id}")).into_response()),
        Err(e) => {
            let page = render_post_page(Some(&current), &state, &id, 1, Some(&e.to_string())).await?;
            Ok(page.into_response())
        }
    }
}

/// Comment moderation queue.
async fn moderate(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Query(query): Query<PageParam>,
) -> AppResult<Markup> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = state.config.app.comments_per_page;
    let comments = state
        .comment_service
        .moderation_queue_with_authors(&current.role, page, per_page)
        .await?;

    let content = html! {
        h1 { "Comment Moderation" }
        @for (comment, author) in &comments.items {
            article .comment {
                header {
                    @if let Some(author) = author {
                        a href={ "/user/" (author.username) } { (author.username) }
                    } @else {
                        span { "deleted user" }
                    }
                    " on "
                    a href={ "/post/" (comment.post_id) } { "post" }
                    " "
                    time datetime=(comment.created_at.to_rfc3339()) {
                        (comment.created_at.format("%Y-%m-%d %H:%M"))
                    }
                }
                div .comment-body { (PreEscaped(&comment.body_html)) }
                footer {
                    @if comment.disabled {
                        strong { "Disabled" }
                        " "
                        a href={ "/moderate/enable/" (comment.id) "?page=" (page) } { "Enable" }
                    } @else {
                        a href={ "/moderate/disable/" (comment.id) "?page=" (page) } { "Disable" }
                    }
                }
            }
        }
        (pager("/moderate", page, per_page, comments.total))
    };

    Ok(base("Moderate Comments", Some(&current), content))
}

/// Re-enable a disabled comment.
async fn moderate_enable(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageParam>,
) -> AppResult<Redirect> {
    state
        .comment_service
        .set_disabled(&id, false, &current.role)
        .await?;
    Ok(Redirect::to(&format!(
        "/moderate?page={}",
        query.page.unwrap_or(1)
    )))
}

/// Disable a comment.
async fn moderate_disable(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageParam>,
) -> AppResult<Redirect> {
    state
        .comment_service
        .set_disabled(&id, true, &current.role)
        .await?;
    Ok(Redirect::to(&format!(
        "/moderate?page={}",
        query.page.unwrap_or(1)
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create_post))
        .route("/post/{id}", get(show_post).post(create_comment))
        .route("/moderate", get(moderate))
        .route("/moderate/enable/{id}", get(moderate_enable))
        .route("/moderate/disable/{id}", get(moderate_disable))
}
