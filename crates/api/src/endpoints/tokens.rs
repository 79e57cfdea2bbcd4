//! Token issuing endpoint.

use axum::{Json, Router, extract::State, routing::post};
use iblog_common::{AppError, AppResult};
use serde::Serialize;

use crate::extractors::ConfirmedUser;
use crate::middleware::{API_TOKEN_MAX_AGE, AppState};

/// Issued token response.
#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    /// Seconds until the token stops being accepted.
    pub expiration: u64,
}

/// Issue a bearer token for the authenticated account.
///
/// Only password-style authentication (HTTP Basic or a session cookie)
/// may mint tokens; a bearer token cannot be used to obtain another.
async fn issue_token(
    ConfirmedUser(current): ConfirmedUser,
    State(state): State<AppState>,
) -> AppResult<Json<TokenResponse>> {
    if current.token_auth {
        return Err(AppError::Unauthorized);
    }

    let token = state.account_service.generate_auth_token(&current.user.id)?;
    Ok(Json(TokenResponse {
        token,
        expiration: API_TOKEN_MAX_AGE,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(issue_token))
}
