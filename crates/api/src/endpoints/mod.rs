//! JSON API endpoints.

mod comments;
mod posts;
mod tokens;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/tokens/", tokens::router())
        .nest("/posts/", posts::router())
        .nest("/comments/", comments::router())
        .nest("/users/", users::router())
}
