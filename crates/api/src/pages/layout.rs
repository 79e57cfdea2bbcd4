//! Shared page layout and widgets.

use iblog_db::entities::{Permission, post, user};
use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::middleware::CurrentUser;

/// Base page skeleton with navigation bar.
pub fn base(title: &str, current: Option<&CurrentUser>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "IBlog - " (title) }
            }
            body {
                nav {
                    a href="/" { "IBlog" }
                    " "
                    a href="/" { "Home" }
                    @if let Some(current) = current {
                        " "
                        a href={ "/user/" (current.user.username) } { "Profile" }
                        @if current.can(Permission::MODERATE) {
                            " "
                            a href="/moderate" { "Moderate Comments" }
                        }
                        " "
                        a href="/auth/logout" { "Log Out" }
                    } @else {
                        " "
                        a href="/auth/login" { "Log In" }
                        " "
                        a href="/auth/register" { "Register" }
                    }
                }
                hr;
                main { (content) }
            }
        }
    }
}

/// An error banner, rendered above forms on failed submissions.
pub fn error_banner(message: Option<&str>) -> Markup {
    html! {
        @if let Some(message) = message {
            p .error { (message) }
        }
    }
}

/// Gravatar URL for a user, falling back to the identicon style.
pub fn avatar_url(user: &user::Model, size: u32) -> String {
    let hash = user.avatar_hash.as_deref().unwrap_or("00000000000000000000000000000000");
    format!("https://secure.gravatar.com/avatar/{hash}?s={size}&d=identicon&r=g")
}

/// One post in a listing. `body_html` is trusted: it was sanitized at
/// write time and is the only pre-escaped content on any page.
pub fn post_item(post: &post::Model, author: Option<&user::Model>) -> Markup {
    html! {
        article .post {
            header {
                @if let Some(author) = author {
                    img src=(avatar_url(author, 40)) alt="avatar" width="40" height="40";
                    " "
                    a href={ "/user/" (author.username) } { (author.username) }
                } @else {
                    span { "deleted user" }
                }
                " "
                time datetime=(post.created_at.to_rfc3339()) {
                    (post.created_at.format("%Y-%m-%d %H:%M"))
                }
            }
            div .post-body { (PreEscaped(&post.body_html)) }
            footer {
                a href={ "/post/" (post.id) } { "Permalink" }
            }
        }
    }
}

/// Previous/next links for a paginated page.
pub fn pager(base_path: &str, page: u64, per_page: u64, total: u64) -> Markup {
    let sep = if base_path.contains('?') { "&" } else { "?" };
    let has_prev = page > 1;
    let has_next = page.saturating_mul(per_page) < total;
    html! {
        nav .pager {
            @if has_prev {
                a href={ (base_path) (sep) "page=" ((page - 1)) } { "Newer" }
            }
            @if has_prev && has_next { " | " }
            @if has_next {
                a href={ (base_path) (sep) "page=" ((page + 1)) } { "Older" }
            }
        }
    }
}
