//! HTTP layer for iblog.
//!
//! This crate provides both surfaces of the application:
//!
//! - **Endpoints**: the paginated JSON API under `/api`
//! - **Pages**: server-rendered HTML pages (maud templates)
//! - **Extractors**: authentication and pagination
//! - **Middleware**: token/basic/cookie authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod pages;
pub mod pagination;

pub use middleware::{
    AppState, CurrentUser, SESSION_COOKIE, auth_middleware, slow_request_middleware,
};
