//! IBlog server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
};
use iblog_api::{AppState, auth_middleware, endpoints, pages, slow_request_middleware};
use iblog_common::{Config, TokenSigner};
use iblog_core::{AccountService, CommentService, FollowService, MailerService, PostService, RoleService};
use iblog_db::repositories::{
    CommentRepository, FollowRepository, PostRepository, RoleRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// 404 handler. API clients get JSON, browsers get a small HTML page.
async fn not_found(headers: HeaderMap) -> Response {
    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));

    if wants_html {
        (
            StatusCode::NOT_FOUND,
            Html("<h1>Not Found</h1><p><a href=\"/\">Back to the home page</a></p>"),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "not_found",
                "message": "The requested resource was not found",
            })),
        )
            .into_response()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iblog=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting iblog server...");

    let config = Arc::new(Config::load()?);

    let db = iblog_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    iblog_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let role_repo = RoleRepository::new(Arc::clone(&db));
    let follow_repo = FollowRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));

    let role_service = RoleService::new(role_repo);

    // Seed or refresh the built-in roles.
    role_service.insert_roles().await?;
    info!("Roles synchronized");

    let signer = TokenSigner::new(&config.app.secret_key);
    let mailer = MailerService::new(config.mail.as_ref(), config.server.url.clone())?;
    if !mailer.is_enabled() {
        info!("Outbound mail is not configured; confirmation emails are disabled");
    }

    let account_service = AccountService::new(
        user_repo,
        follow_repo.clone(),
        role_service.clone(),
        mailer,
        signer,
        config.app.admin_email.clone(),
    );
    let follow_service = FollowService::new(follow_repo, UserRepository::new(Arc::clone(&db)));
    let post_service = PostService::new(post_repo);
    let comment_service = CommentService::new(comment_repo, PostRepository::new(Arc::clone(&db)));

    let state = AppState {
        account_service,
        role_service,
        follow_service,
        post_service,
        comment_service,
        config: Arc::clone(&config),
    };

    let app = Router::new()
        .merge(pages::router())
        .nest("/api", endpoints::router())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            slow_request_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from((config.server.host.parse::<std::net::IpAddr>()?, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
