//! User profile, profile editing and follow pages.

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use iblog_common::{AppError, AppResult};
use iblog_core::{AdminUpdateProfileInput, UpdateProfileInput};
use iblog_db::entities::{Permission, role, user};
use maud::{Markup, html};
use serde::Deserialize;

use crate::extractors::MaybeAuthUser;
use crate::middleware::AppState;
use crate::pages::WebUser;
use crate::pages::layout::{avatar_url, base, error_banner, pager, post_item};

#[derive(Debug, Default, Deserialize)]
struct PageParam {
    #[serde(default)]
    page: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProfileForm {
    name: Option<String>,
    location: Option<String>,
    about_me: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdminProfileForm {
    email: Option<String>,
    username: Option<String>,
    /// Present when the checkbox is ticked.
    confirmed: Option<String>,
    role_id: Option<String>,
    name: Option<String>,
    location: Option<String>,
    about_me: Option<String>,
}

/// Empty form fields arrive as `Some("")`; treat those as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Profile page with the user's posts.
async fn profile(
    MaybeAuthUser(current): MaybeAuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageParam>,
) -> AppResult<Markup> {
    let user = state
        .account_service
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::UserNotFound(username.clone()))?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = state.config.app.posts_per_page;
    let posts = state.post_service.by_author(&user.id, page, per_page).await?;
    let post_count = state.post_service.count_by_author(&user.id).await?;

    // Counts exclude the mandatory self-follow for display.
    let follower_count = state
        .follow_service
        .follower_count(&user.id)
        .await?
        .saturating_sub(1);
    let following_count = state
        .follow_service
        .following_count(&user.id)
        .await?
        .saturating_sub(1);

    let viewer = current.as_ref();
    let is_self = viewer.is_some_and(|c| c.user.id == user.id);
    let mut viewer_follows = false;
    let mut follows_viewer = false;
    if let Some(viewer) = viewer {
        if !is_self {
            viewer_follows = state
                .follow_service
                .is_following(&viewer.user.id, &user.id)
                .await?;
            follows_viewer = state
                .follow_service
                .is_followed_by(&viewer.user.id, &user.id)
                .await?;
        }
    }

    let content = html! {
        header .profile {
            img src=(avatar_url(&user, 128)) alt="avatar" width="128" height="128";
            h1 { (user.username) }
            @if let Some(name) = &user.name { p { (name) } }
            @if let Some(location) = &user.location { p { "From " (location) } }
            @if let Some(about_me) = &user.about_me { p { (about_me) } }
            p {
                "Member since " (user.member_since.format("%Y-%m-%d"))
                ". Last seen " (user.last_seen.format("%Y-%m-%d %H:%M")) "."
            }
            p {
                (post_count) " posts. "
                a href={ "/followers/" (user.username) } { (follower_count) " followers" }
                " | "
                a href={ "/followed-by/" (user.username) } { "following " (following_count) }
            }
            @if let Some(viewer) = viewer {
                @if !is_self && viewer.can(Permission::FOLLOW) {
                    @if viewer_follows {
                        a href={ "/unfollow/" (user.username) } { "Unfollow" }
                    } @else {
                        a href={ "/follow/" (user.username) } { "Follow" }
                    }
                }
                @if follows_viewer { " " em { "Follows you" } }
                @if is_self {
                    " " a href="/edit-profile" { "Edit Profile" }
                    " | " a href="/auth/change_password" { "Change Password" }
                    " | " a href="/auth/change_email" { "Change Email" }
                }
                @if viewer.can(Permission::ADMIN) {
                    " " a href={ "/edit-profile/" (user.id) } { "Edit Profile [Admin]" }
                }
            }
        }
        h2 { "Posts" }
        @for post in &posts.items {
            (post_item(post, Some(&user)))
        }
        (pager(&format!("/user/{}", user.username), page, per_page, posts.total))
    };

    Ok(base(&user.username, viewer, content))
}

fn profile_form(user: &user::Model, error: Option<&str>) -> Markup {
    html! {
        h1 { "Edit Your Profile" }
        (error_banner(error))
        form method="post" action="/edit-profile" {
            label { "Name" br;
                input type="text" name="name" value=[user.name.as_deref()];
            }
            br;
            label { "Location" br;
                input type="text" name="location" value=[user.location.as_deref()];
            }
            br;
            label { "About me" br;
                textarea name="about_me" rows="4" cols="60" {
                    (user.about_me.as_deref().unwrap_or(""))
                }
            }
            br;
            button type="submit" { "Submit" }
        }
    }
}

/// Profile editor for the logged-in user.
async fn edit_profile(WebUser(current): WebUser) -> Markup {
    let form = profile_form(&current.user, None);
    base("Edit Profile", Some(&current), form)
}

/// Apply profile edits.
async fn update_profile(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let input = UpdateProfileInput {
        name: non_empty(form.name),
        location: non_empty(form.location),
        about_me: non_empty(form.about_me),
    };

    match state.account_service.update_profile(current.user.clone(), input).await {
        Ok(updated) => Ok(Redirect::to(&format!("/user/{}", updated.username)).into_response()),
        Err(e) => {
            let form = profile_form(&current.user, Some(&e.to_string()));
            Ok(base("Edit Profile", Some(&current), form).into_response())
        }
    }
}

fn admin_profile_form(
    user: &user::Model,
    roles: &[role::Model],
    error: Option<&str>,
) -> Markup {
    html! {
        h1 { "Edit Profile [Admin]" }
        (error_banner(error))
        form method="post" action={ "/edit-profile/" (user.id) } {
            label { "Email" br;
                input type="text" name="email" value=(user.email);
            }
            br;
            label { "Username" br;
                input type="text" name="username" value=(user.username);
            }
            br;
            label {
                input type="checkbox" name="confirmed" checked[user.confirmed];
                " Confirmed"
            }
            br;
            label { "Role" br;
                select name="role_id" {
                    @for role in roles {
                        option value=(role.id) selected[role.id == user.role_id] {
                            (role.name)
                        }
                    }
                }
            }
            br;
            label { "Name" br;
                input type="text" name="name" value=[user.name.as_deref()];
            }
            br;
            label { "Location" br;
                input type="text" name="location" value=[user.location.as_deref()];
            }
            br;
            label { "About me" br;
                textarea name="about_me" rows="4" cols="60" {
                    (user.about_me.as_deref().unwrap_or(""))
                }
            }
            br;
            button type="submit" { "Submit" }
        }
    }
}

/// Administrator's profile editor for any user.
async fn edit_profile_admin(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Markup> {
    if !current.can(Permission::ADMIN) {
        return Err(AppError::Forbidden);
    }
    let user = state.account_service.get_by_id(&id).await?;
    let roles = state.role_service.all().await?;
    let form = admin_profile_form(&user, &roles, None);
    Ok(base("Edit Profile", Some(&current), form))
}

/// Apply an administrator's profile edits.
async fn update_profile_admin(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<AdminProfileForm>,
) -> AppResult<Response> {
    if !current.can(Permission::ADMIN) {
        return Err(AppError::Forbidden);
    }

    let input = AdminUpdateProfileInput {
        email: non_empty(form.email),
        username: non_empty(form.username),
        confirmed: Some(form.confirmed.is_some()),
        role_id: non_empty(form.role_id),
        name: non_empty(form.name),
        location: non_empty(form.location),
        about_me: non_empty(form.about_me),
    };

    match state.account_service.admin_update_profile(&id, input).await {
        Ok(updated) => Ok(Redirect::to(&format!("/user/{}", updated.username)).into_response()),
        Err(e) => {
            let user = state.account_service.get_by_id(&id).await?;
            let roles = state.role_service.all().await?;
            let form = admin_profile_form(&user, &roles, Some(&e.to_string()));
            Ok(base("Edit Profile", Some(&current), form).into_response())
        }
    }
}

/// Follow a user by username.
async fn follow(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    if !current.can(Permission::FOLLOW) {
        return Err(AppError::Forbidden);
    }
    let target = state
        .account_service
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::UserNotFound(username.clone()))?;

    state.follow_service.follow(&current.user.id, &target.id).await?;
    Ok(Redirect::to(&format!("/user/{username}")))
}

/// Unfollow a user by username.
async fn unfollow(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    if !current.can(Permission::FOLLOW) {
        return Err(AppError::Forbidden);
    }
    let target = state
        .account_service
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::UserNotFound(username.clone()))?;

    state.follow_service.unfollow(&current.user.id, &target.id).await?;
    Ok(Redirect::to(&format!("/user/{username}")))
}

fn follow_listing(
    title: &str,
    target: &user::Model,
    users: &[user::Model],
    base_path: &str,
    page: u64,
    per_page: u64,
    total: u64,
) -> Markup {
    html! {
        h1 { (title) " " a href={ "/user/" (target.username) } { (target.username) } }
        ul .user-list {
            @for user in users {
                // The self-follow edge is an implementation detail.
                @if user.id != target.id {
                    li {
                        img src=(avatar_url(user, 24)) alt="avatar" width="24" height="24";
                        " "
                        a href={ "/user/" (user.username) } { (user.username) }
                    }
                }
            }
        }
        (pager(base_path, page, per_page, total))
    }
}

/// Users following `username`.
async fn followers(
    MaybeAuthUser(current): MaybeAuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageParam>,
) -> AppResult<Markup> {
    let target = state
        .account_service
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::UserNotFound(username.clone()))?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = state.config.app.followers_per_page;
    let paged = state.follow_service.followers(&target.id, page, per_page).await?;

    let content = follow_listing(
        "Followers of",
        &target,
        &paged.items,
        &format!("/followers/{username}"),
        page,
        per_page,
        paged.total,
    );
    Ok(base("Followers", current.as_ref(), content))
}

/// Users that `username` follows.
async fn followed_by(
    MaybeAuthUser(current): MaybeAuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageParam>,
) -> AppResult<Markup> {
    let target = state
        .account_service
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::UserNotFound(username.clone()))?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = state.config.app.followers_per_page;
    let paged = state.follow_service.following(&target.id, page, per_page).await?;

    let content = follow_listing(
        "Followed by",
        &target,
        &paged.items,
        &format!("/followed-by/{username}"),
        page,
        per_page,
        paged.total,
    );
    Ok(base("Followed by", current.as_ref(), content))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/{username}", get(profile))
        .route("/edit-profile", get(edit_profile).post(update_profile))
        .route(
            "/edit-profile/{id}",
            get(edit_profile_admin).post(update_profile_admin),
        )
        .route("/follow/{username}", get(follow))
        .route("/unfollow/{username}", get(unfollow))
        .route("/followers/{username}", get(followers))
        .route("/followed-by/{username}", get(followed_by))
}
