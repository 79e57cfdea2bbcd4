//! API middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use iblog_common::Config;
use iblog_core::{AccountService, CommentService, FollowService, PostService, RoleService};
use iblog_db::entities::{role, user};

/// Name of the cookie holding the session identity token.
pub const SESSION_COOKIE: &str = "session";

/// Lifetime of API bearer tokens in seconds.
pub const API_TOKEN_MAX_AGE: u64 = 3600;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub account_service: AccountService,
    pub role_service: RoleService,
    pub follow_service: FollowService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub config: Arc<Config>,
}

/// The authenticated caller with their role resolved.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: user::Model,
    pub role: role::Model,
    /// True when the request authenticated with a bearer token. Such
    /// requests may not mint further tokens.
    pub token_auth: bool,
}

impl CurrentUser {
    /// Check a permission bit against the caller's role.
    #[must_use]
    pub const fn can(&self, permission: i32) -> bool {
        self.role.has_permission(permission)
    }
}

/// Authentication middleware.
///
/// Tries, in order: `Authorization: Bearer` (identity token),
/// `Authorization: Basic` (email and password), then the session
/// cookie. On success the resolved [`CurrentUser`] is attached to the
/// request and the account's `last_seen` is refreshed. Anonymous
/// requests pass through untouched; handlers decide what requires
/// authentication.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Only the headers are needed; holding the request itself across
    // the lookup awaits would make this future !Send.
    let headers = req.headers().clone();
    let current = resolve_user(&state, &headers).await;

    if let Some(current) = current {
        req.extensions_mut().insert(current);
    }

    next.run(req).await
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let header = headers.get("Authorization").and_then(|v| v.to_str().ok());

    let (user, token_auth) = match header {
        Some(value) if value.starts_with("Bearer ") => {
            let token = value.trim_start_matches("Bearer ").trim();
            let user = state
                .account_service
                .authenticate_by_token(token, API_TOKEN_MAX_AGE)
                .await
                .ok()?;
            (user, true)
        }
        Some(value) if value.starts_with("Basic ") => {
            let encoded = value.trim_start_matches("Basic ").trim();
            let (email, password) = decode_basic(encoded)?;
            let user = state
                .account_service
                .authenticate(&email, &password)
                .await
                .ok()?;
            (user, false)
        }
        _ => {
            let jar = CookieJar::from_headers(headers);
            let token = jar.get(SESSION_COOKIE)?.value().to_string();
            let user = state
                .account_service
                .authenticate_by_token(&token, state.config.app.session_max_age)
                .await
                .ok()?;
            (user, false)
        }
    };

    let role = match state.role_service.get_by_id(&user.role_id).await {
        Ok(role) => role,
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Authenticated user has no role");
            return None;
        }
    };

    // A failed last_seen refresh must not turn an authenticated
    // request into an anonymous one.
    let user = match state.account_service.ping(user.clone()).await {
        Ok(refreshed) => refreshed,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to refresh last_seen");
            user
        }
    };

    Some(CurrentUser {
        user,
        role,
        token_auth,
    })
}

/// Logs requests slower than the configured threshold.
pub async fn slow_request_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let start = std::time::Instant::now();
    let response = next.run(req).await;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    if elapsed_ms > state.config.app.slow_request_ms {
        tracing::warn!(
            %method,
            path,
            elapsed_ms,
            status = %response.status(),
            "Slow request"
        );
    }

    response
}

/// Decode an HTTP Basic credential pair.
fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let decoded = BASE64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (email, password) = decoded.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basic() {
        let encoded = BASE64.encode("joe@example.com:cat12345");
        let (email, password) = decode_basic(&encoded).unwrap();
        assert_eq!(email, "joe@example.com");
        assert_eq!(password, "cat12345");
    }

    #[test]
    fn test_decode_basic_password_may_contain_colon() {
        let encoded = BASE64.encode("joe@example.com:a:b:c");
        let (_, password) = decode_basic(&encoded).unwrap();
        assert_eq!(password, "a:b:c");
    }

    #[test]
    fn test_decode_basic_rejects_garbage() {
        assert!(decode_basic("not base64!!!").is_none());
        let no_colon = BASE64.encode("nocolon");
        assert!(decode_basic(&no_colon).is_none());
    }
}
