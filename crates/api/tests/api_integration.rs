//! Router-level integration tests.
//!
//! Each test builds the full router (HTML pages plus the `/api` JSON
//! endpoints, behind the authentication middleware) over a mock
//! database seeded with the exact query results the request will
//! consume.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware,
};
use chrono::Utc;
use iblog_api::{AppState, auth_middleware};
use iblog_common::{Config, TokenPurpose, TokenSigner};
use iblog_common::config::{AppConfig, DatabaseConfig, ServerConfig};
use iblog_core::{
    AccountService, CommentService, FollowService, MailerService, PostService, RoleService,
};
use iblog_db::entities::{Permission, follow, post, role, user};
use iblog_db::repositories::{
    CommentRepository, FollowRepository, PostRepository, RoleRepository, UserRepository,
};
use sea_orm::{DatabaseBackend, DbErr, MockDatabase};
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret";

fn create_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            url: "http://localhost:3000".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        mail: None,
        app: AppConfig {
            secret_key: SECRET.to_string(),
            admin_email: None,
            posts_per_page: 20,
            comments_per_page: 30,
            followers_per_page: 50,
            session_max_age: 3600,
            slow_request_ms: 500,
        },
    }
}

fn create_test_state(mock: MockDatabase) -> AppState {
    let db = Arc::new(mock.into_connection());
    let config = Arc::new(create_test_config());

    let role_service = RoleService::new(RoleRepository::new(Arc::clone(&db)));
    let signer = TokenSigner::new(&config.app.secret_key);
    let mailer = MailerService::new(None, config.server.url.clone()).unwrap();

    let account_service = AccountService::new(
        UserRepository::new(Arc::clone(&db)),
        FollowRepository::new(Arc::clone(&db)),
        role_service.clone(),
        mailer,
        signer,
        config.app.admin_email.clone(),
    );
    let follow_service = FollowService::new(
        FollowRepository::new(Arc::clone(&db)),
        UserRepository::new(Arc::clone(&db)),
    );
    let post_service = PostService::new(PostRepository::new(Arc::clone(&db)));
    let comment_service = CommentService::new(
        CommentRepository::new(Arc::clone(&db)),
        PostRepository::new(Arc::clone(&db)),
    );

    AppState {
        account_service,
        role_service,
        follow_service,
        post_service,
        comment_service,
        config,
    }
}

fn create_test_router(state: AppState) -> Router {
    Router::new()
        .merge(iblog_api::pages::router())
        .nest("/api", iblog_api::endpoints::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}

fn user_role() -> role::Model {
    role::Model {
        id: "r1".to_string(),
        name: "User".to_string(),
        is_default: true,
        permissions: Permission::FOLLOW | Permission::COMMENT | Permission::WRITE,
    }
}

fn joe(confirmed: bool) -> user::Model {
    let now = Utc::now().fixed_offset();
    user::Model {
        id: "u1".to_string(),
        username: "joe".to_string(),
        email: "joe@example.com".to_string(),
        password_hash: "not-checked-here".to_string(),
        confirmed,
        role_id: "r1".to_string(),
        name: None,
        location: None,
        about_me: None,
        member_since: now,
        last_seen: now,
        avatar_hash: None,
    }
}

fn session_token() -> String {
    TokenSigner::new(SECRET)
        .generate(TokenPurpose::Id, "u1")
        .unwrap()
}

fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
    maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
}

/// Query results consumed by the auth middleware for a session or
/// bearer request: the user lookup, the role lookup and the
/// `last_seen` refresh (Postgres updates return the row).
fn mock_with_session(user: user::Model) -> MockDatabase {
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[user.clone()]])
        .append_query_results([[user_role()]])
        .append_query_results([[user]])
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_register_sets_session_and_redirects() {
    // No duplicate email, no duplicate username, then the default
    // role, the inserted user and the inserted self-follow.
    let mock = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<user::Model>::new()])
        .append_query_results([Vec::<user::Model>::new()])
        .append_query_results([[user_role()]])
        .append_query_results([[joe(false)]])
        .append_query_results([[follow::Model {
            follower_id: "u1".to_string(),
            followed_id: "u1".to_string(),
            created_at: Utc::now().fixed_offset(),
        }]]);
    let app = create_test_router(create_test_state(mock));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(
                    "email=joe%40example.com&username=joe&password=cat12345",
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_home_greets_session_user_with_unconfirmed_notice() {
    let mock = mock_with_session(joe(false))
        .append_query_results([vec![count_row(0)]])
        .append_query_results([Vec::<post::Model>::new()]);
    let app = create_test_router(create_test_state(mock));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("Cookie", format!("session={}", session_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Hello, joe!"));
    assert!(body.contains("/auth/confirm"));
}

#[tokio::test]
async fn test_home_after_confirmation_drops_notice() {
    let mock = mock_with_session(joe(true))
        .append_query_results([vec![count_row(0)]])
        .append_query_results([Vec::<post::Model>::new()]);
    let app = create_test_router(create_test_state(mock));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("Cookie", format!("session={}", session_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Hello, joe!"));
    assert!(!body.contains("not confirmed your account"));
}

#[tokio::test]
async fn test_confirm_link_confirms_and_redirects_home() {
    // Middleware resolves the unconfirmed user, then the confirmation
    // writes the flag back.
    let mock = mock_with_session(joe(false)).append_query_results([[joe(true)]]);
    let app = create_test_router(create_test_state(mock));

    let token = TokenSigner::new(SECRET)
        .generate(TokenPurpose::Confirm, "u1")
        .unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/auth/confirm/{token}"))
                .header("Cookie", format!("session={}", session_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_logout_clears_session_cookie() {
    let mock = MockDatabase::new(DatabaseBackend::Postgres);
    let app = create_test_router(create_test_state(mock));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_api_post_with_empty_body_is_rejected() {
    // Only the middleware queries are mocked: a rejected request must
    // never reach the insert.
    let mock = mock_with_session(joe(true));
    let app = create_test_router(create_test_state(mock));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/posts/")
                .header("Authorization", format!("Bearer {}", session_token()))
                .header("Content-Type", "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_is_closed_to_unconfirmed_accounts() {
    let mock = mock_with_session(joe(false));
    let app = create_test_router(create_test_state(mock));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/posts/")
                .header("Authorization", format!("Bearer {}", session_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_failed_last_seen_refresh_keeps_user_logged_in() {
    // User and role resolve, but the last_seen update fails.
    let mock = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[joe(true)]])
        .append_query_results([[user_role()]])
        .append_query_errors([DbErr::Custom("connection lost".to_string())]);
    let app = create_test_router(create_test_state(mock));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/change_password")
                .header("Cookie", format!("session={}", session_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // An anonymous visitor would have been redirected to the login page.
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Change Your Password"));
}
