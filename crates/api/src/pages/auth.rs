//! Authentication pages: login, registration and the emailed-token flows.

use axum::{
    Form, Router,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use iblog_common::AppResult;
use iblog_core::RegisterInput;
use maud::{Markup, html};
use serde::Deserialize;

use crate::extractors::MaybeAuthUser;
use crate::middleware::{AppState, CurrentUser, SESSION_COOKIE};
use crate::pages::WebUser;
use crate::pages::layout::{base, error_banner};

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ResetRequestForm {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ResetForm {
    password: String,
}

#[derive(Debug, Deserialize)]
struct ChangePasswordForm {
    old_password: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ChangeEmailForm {
    email: String,
    password: String,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .build()
}

/// A short standalone page with a single message.
fn message_page(title: &str, current: Option<&CurrentUser>, message: &str) -> Markup {
    let content = html! {
        h1 { (title) }
        p { (message) }
        p { a href="/" { "Back to the home page" } }
    };
    base(title, current, content)
}

fn login_form(error: Option<&str>) -> Markup {
    let content = html! {
        h1 { "Log In" }
        (error_banner(error))
        form method="post" action="/auth/login" {
            label { "Email" br; input type="email" name="email" required; }
            br;
            label { "Password" br; input type="password" name="password" required; }
            br;
            button type="submit" { "Log In" }
        }
        p { a href="/auth/reset" { "Forgot your password?" } }
        p { "New user? " a href="/auth/register" { "Click here to register" } }
    };
    base("Log In", None, content)
}

async fn login_page(MaybeAuthUser(current): MaybeAuthUser) -> Response {
    if current.is_some() {
        return Redirect::to("/").into_response();
    }
    login_form(None).into_response()
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    match state
        .account_service
        .authenticate(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            let token = state.account_service.generate_auth_token(&user.id)?;
            let jar = jar.add(session_cookie(token));
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(_) => Ok(login_form(Some("Invalid email or password.")).into_response()),
    }
}

async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    (jar, Redirect::to("/"))
}

fn register_form(error: Option<&str>) -> Markup {
    let content = html! {
        h1 { "Register" }
        (error_banner(error))
        form method="post" action="/auth/register" {
            label { "Email" br; input type="email" name="email" required; }
            br;
            label { "Username" br; input type="text" name="username" required; }
            br;
            label { "Password" br;
                input type="password" name="password" minlength="8" required;
            }
            br;
            button type="submit" { "Register" }
        }
        p { "Already registered? " a href="/auth/login" { "Click here to log in" } }
    };
    base("Register", None, content)
}

async fn register_page(MaybeAuthUser(current): MaybeAuthUser) -> Response {
    if current.is_some() {
        return Redirect::to("/").into_response();
    }
    register_form(None).into_response()
}

/// Register and log the new account straight in. The home page shows
/// the unconfirmed-account notice until the emailed link is followed.
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(input): Form<RegisterInput>,
) -> AppResult<Response> {
    match state.account_service.register(input).await {
        Ok(user) => {
            let token = state.account_service.generate_auth_token(&user.id)?;
            let jar = jar.add(session_cookie(token));
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e) => Ok(register_form(Some(&e.to_string())).into_response()),
    }
}

/// Confirm an account from the emailed link.
async fn confirm(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Response> {
    match state.account_service.confirm(current.user.clone(), &token).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(e) => Ok(message_page("Confirmation", Some(&current), &e.to_string()).into_response()),
    }
}

/// Resend the confirmation email.
async fn resend_confirmation(WebUser(current): WebUser, State(state): State<AppState>) -> Markup {
    state.account_service.send_confirmation(&current.user);
    message_page(
        "Confirmation",
        Some(&current),
        "A new confirmation email has been sent to you by email.",
    )
}

fn reset_request_form() -> Markup {
    let content = html! {
        h1 { "Reset Your Password" }
        form method="post" action="/auth/reset" {
            label { "Email" br; input type="email" name="email" required; }
            br;
            button type="submit" { "Reset Password" }
        }
    };
    base("Reset Password", None, content)
}

async fn reset_request_page(MaybeAuthUser(current): MaybeAuthUser) -> Response {
    if current.is_some() {
        return Redirect::to("/").into_response();
    }
    reset_request_form().into_response()
}

/// Request a password reset email. The response is the same whether or
/// not the address belongs to an account.
async fn reset_request(
    MaybeAuthUser(current): MaybeAuthUser,
    State(state): State<AppState>,
    Form(form): Form<ResetRequestForm>,
) -> AppResult<Response> {
    if current.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    state.account_service.request_password_reset(&form.email).await?;
    Ok(message_page(
        "Reset Password",
        None,
        "If that address belongs to an account, an email with reset instructions is on its way.",
    )
    .into_response())
}

fn reset_form(token: &str, error: Option<&str>) -> Markup {
    let content = html! {
        h1 { "Choose a New Password" }
        (error_banner(error))
        form method="post" action={ "/auth/reset/" (token) } {
            label { "New password" br;
                input type="password" name="password" minlength="8" required;
            }
            br;
            button type="submit" { "Set Password" }
        }
    };
    base("Reset Password", None, content)
}

async fn reset_page(Path(token): Path<String>) -> Markup {
    reset_form(&token, None)
}

async fn reset(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(form): Form<ResetForm>,
) -> AppResult<Response> {
    match state
        .account_service
        .reset_password(&token, &form.password)
        .await
    {
        Ok(_) => Ok(Redirect::to("/auth/login").into_response()),
        Err(e) => Ok(reset_form(&token, Some(&e.to_string())).into_response()),
    }
}

fn change_password_form(current: &CurrentUser, error: Option<&str>) -> Markup {
    let content = html! {
        h1 { "Change Your Password" }
        (error_banner(error))
        form method="post" action="/auth/change_password" {
            label { "Old password" br;
                input type="password" name="old_password" required;
            }
            br;
            label { "New password" br;
                input type="password" name="password" minlength="8" required;
            }
            br;
            button type="submit" { "Change Password" }
        }
    };
    base("Change Password", Some(current), content)
}

async fn change_password_page(WebUser(current): WebUser) -> Markup {
    change_password_form(&current, None)
}

async fn change_password(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Form(form): Form<ChangePasswordForm>,
) -> AppResult<Response> {
    match state
        .account_service
        .change_password(current.user.clone(), &form.old_password, &form.password)
        .await
    {
        Ok(user) => Ok(Redirect::to(&format!("/user/{}", user.username)).into_response()),
        Err(e) => Ok(change_password_form(&current, Some(&e.to_string())).into_response()),
    }
}

fn change_email_form(current: &CurrentUser, error: Option<&str>) -> Markup {
    let content = html! {
        h1 { "Change Your Email Address" }
        (error_banner(error))
        form method="post" action="/auth/change_email" {
            label { "New email" br; input type="email" name="email" required; }
            br;
            label { "Password" br; input type="password" name="password" required; }
            br;
            button type="submit" { "Change Email" }
        }
    };
    base("Change Email", Some(current), content)
}

async fn change_email_page(WebUser(current): WebUser) -> Markup {
    change_email_form(&current, None)
}

/// Start an email change. The token goes to the *new* address so only
/// someone who controls it can complete the switch.
async fn change_email_request(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Form(form): Form<ChangeEmailForm>,
) -> AppResult<Response> {
    match state
        .account_service
        .request_email_change(&current.user, &form.password, &form.email)
        .await
    {
        Ok(()) => Ok(message_page(
            "Change Email",
            Some(&current),
            "An email with instructions to confirm your new address has been sent to it.",
        )
        .into_response()),
        Err(e) => Ok(change_email_form(&current, Some(&e.to_string())).into_response()),
    }
}

/// Complete an email change from the emailed link.
async fn change_email(
    WebUser(current): WebUser,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Response> {
    match state
        .account_service
        .change_email(current.user.clone(), &token)
        .await
    {
        Ok(user) => Ok(Redirect::to(&format!("/user/{}", user.username)).into_response()),
        Err(e) => Ok(message_page("Change Email", Some(&current), &e.to_string()).into_response()),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
        .route("/register", get(register_page).post(register))
        .route("/confirm", get(resend_confirmation))
        .route("/confirm/{token}", get(confirm))
        .route("/reset", get(reset_request_page).post(reset_request))
        .route("/reset/{token}", get(reset_page).post(reset))
        .route(
            "/change_password",
            get(change_password_page).post(change_password),
        )
        .route(
            "/change_email",
            get(change_email_page).post(change_email_request),
        )
        .route("/change_email/{token}", get(change_email))
}
