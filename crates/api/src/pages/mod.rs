//! Server-rendered HTML pages.

mod auth;
mod layout;
mod main;
mod users;

use axum::{Router, extract::FromRequestParts, http::request::Parts, response::Redirect};

use crate::middleware::{AppState, CurrentUser};

/// Create the HTML page router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(main::router())
        .merge(users::router())
        .nest("/auth", auth::router())
}

/// Logged-in user extractor for HTML pages.
///
/// Unlike the API extractors this redirects anonymous visitors to the
/// login page instead of answering 401.
#[derive(Debug, Clone)]
pub struct WebUser(pub CurrentUser);

impl<S> FromRequestParts<S> for WebUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(WebUser)
            .ok_or_else(|| Redirect::to("/auth/login"))
    }
}
