//! Account service: registration, authentication and profile management.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use iblog_common::{AppError, AppResult, IdGenerator, TokenPurpose, TokenSigner};
use iblog_db::{
    entities::{follow, user},
    repositories::{FollowRepository, RoleRepository, UserRepository},
};
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::Validate;

use crate::services::mailer::MailerService;
use crate::services::role::RoleService;

/// Validity of confirmation, reset and email-change tokens in seconds.
const ONE_HOUR: u64 = 3600;

/// Account service for business logic.
#[derive(Clone)]
pub struct AccountService {
    user_repo: UserRepository,
    follow_repo: FollowRepository,
    role_service: RoleService,
    mailer: MailerService,
    signer: TokenSigner,
    id_gen: IdGenerator,
    admin_email: Option<String>,
}

/// Input for registering a new account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email, length(max = 64))]
    pub email: String,

    #[validate(length(min = 1, max = 64))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Input for editing one's own profile.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(max = 64))]
    pub name: Option<String>,

    #[validate(length(max = 64))]
    pub location: Option<String>,

    pub about_me: Option<String>,
}

/// Input for the administrator's profile editor.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AdminUpdateProfileInput {
    #[validate(email, length(max = 64))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,

    pub confirmed: Option<bool>,

    pub role_id: Option<String>,

    #[validate(length(max = 64))]
    pub name: Option<String>,

    #[validate(length(max = 64))]
    pub location: Option<String>,

    pub about_me: Option<String>,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        follow_repo: FollowRepository,
        role_service: RoleService,
        mailer: MailerService,
        signer: TokenSigner,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            user_repo,
            follow_repo,
            role_service,
            mailer,
            signer,
            id_gen: IdGenerator::new(),
            admin_email,
        }
    }

    /// Register a new account.
    ///
    /// The new user starts unconfirmed and following themselves, and a
    /// confirmation email is sent when mail is configured. Registering
    /// with the configured administrator address grants the
    /// Administrator role directly.
    pub async fn register(&self, input: RegisterInput) -> AppResult<user::Model> {
        input.validate()?;

        if !valid_username(&input.username) {
            return Err(AppError::BadRequest(
                "Usernames must start with a letter and contain only letters, numbers, dots or underscores".to_string(),
            ));
        }

        if self.user_repo.find_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already in use".to_string()));
        }

        let role = if self.admin_email.as_deref() == Some(input.email.as_str()) {
            self.role_service
                .find_by_name("Administrator")
                .await?
                .ok_or_else(|| AppError::Internal("Administrator role missing".to_string()))?
        } else {
            self.role_service.default_role().await?
        };

        let password_hash = hash_password(&input.password)?;
        let user_id = self.id_gen.generate();
        let now = Utc::now().fixed_offset();

        let model = user::ActiveModel {
            id: Set(user_id.clone()),
            username: Set(input.username.clone()),
            email: Set(input.email.clone()),
            password_hash: Set(password_hash),
            confirmed: Set(false),
            role_id: Set(role.id),
            name: Set(None),
            location: Set(None),
            about_me: Set(None),
            member_since: Set(now),
            last_seen: Set(now),
            avatar_hash: Set(Some(gravatar_hash(&input.email))),
        };
        let user = self.user_repo.create(model).await?;

        // Every account follows itself so its own posts show up in the
        // followed timeline.
        let self_follow = follow::ActiveModel {
            follower_id: Set(user_id.clone()),
            followed_id: Set(user_id),
            created_at: Set(now),
        };
        self.follow_repo.create(self_follow).await?;

        self.send_confirmation(&user);
        tracing::info!(user_id = %user.id, username = %user.username, "Registered new account");

        Ok(user)
    }

    /// Authenticate by email and password.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Authenticate by a previously issued identity token.
    pub async fn authenticate_by_token(
        &self,
        token: &str,
        max_age_secs: u64,
    ) -> AppResult<user::Model> {
        let claims = self
            .signer
            .verify(token, TokenPurpose::Id, max_age_secs)
            .ok_or(AppError::Unauthorized)?;

        self.user_repo
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Issue an identity token for API and session use.
    pub fn generate_auth_token(&self, user_id: &str) -> AppResult<String> {
        self.signer.generate(TokenPurpose::Id, user_id)
    }

    /// Send (or resend) the account confirmation email.
    pub fn send_confirmation(&self, user: &user::Model) {
        match self.signer.generate(TokenPurpose::Confirm, &user.id) {
            Ok(token) => self
                .mailer
                .send_confirmation(&user.email, &user.username, &token),
            Err(e) => tracing::warn!(user_id = %user.id, error = %e, "Failed to sign confirmation token"),
        }
    }

    /// Confirm an account from an emailed token.
    ///
    /// Confirming an already confirmed account is a no-op. A token
    /// minted for a different account is rejected.
    pub async fn confirm(&self, user: user::Model, token: &str) -> AppResult<user::Model> {
        if user.confirmed {
            return Ok(user);
        }

        self.signer
            .verify(token, TokenPurpose::Confirm, ONE_HOUR)
            .filter(|c| c.sub == user.id)
            .ok_or_else(|| {
                AppError::BadRequest("The confirmation link is invalid or has expired".to_string())
            })?;

        let mut model = user.into_active_model();
        model.confirmed = Set(true);
        self.user_repo.update(model).await
    }

    /// Send a password reset email if the address belongs to an account.
    ///
    /// Always succeeds so the endpoint cannot be used to probe which
    /// addresses are registered.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        if let Some(user) = self.user_repo.find_by_email(email).await? {
            match self.signer.generate(TokenPurpose::Reset, &user.id) {
                Ok(token) => self
                    .mailer
                    .send_password_reset(&user.email, &user.username, &token),
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Failed to sign reset token");
                }
            }
        }
        Ok(())
    }

    /// Reset a password from an emailed token.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<user::Model> {
        if new_password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let claims = self
            .signer
            .verify(token, TokenPurpose::Reset, ONE_HOUR)
            .ok_or_else(|| {
                AppError::BadRequest("The reset link is invalid or has expired".to_string())
            })?;

        let user = self
            .user_repo
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("The reset link is invalid or has expired".to_string())
            })?;

        let mut model = user.into_active_model();
        model.password_hash = Set(hash_password(new_password)?);
        self.user_repo.update(model).await
    }

    /// Change the password of a logged-in user.
    pub async fn change_password(
        &self,
        user: user::Model,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<user::Model> {
        if !verify_password(old_password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }
        if new_password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let mut model = user.into_active_model();
        model.password_hash = Set(hash_password(new_password)?);
        self.user_repo.update(model).await
    }

    /// Start an email address change by mailing a token to the new address.
    pub async fn request_email_change(
        &self,
        user: &user::Model,
        password: &str,
        new_email: &str,
    ) -> AppResult<()> {
        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }
        if self.user_repo.find_by_email(new_email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let token = self.signer.generate_email_change(&user.id, new_email)?;
        self.mailer
            .send_email_change(new_email, &user.username, &token);
        Ok(())
    }

    /// Complete an email address change from an emailed token.
    ///
    /// The new address is re-checked for uniqueness since another
    /// account may have claimed it while the token was in transit.
    pub async fn change_email(&self, user: user::Model, token: &str) -> AppResult<user::Model> {
        let claims = self
            .signer
            .verify(token, TokenPurpose::ChangeEmail, ONE_HOUR)
            .filter(|c| c.sub == user.id)
            .ok_or_else(|| {
                AppError::BadRequest("The email change link is invalid or has expired".to_string())
            })?;

        let new_email = claims.new_email.ok_or_else(|| {
            AppError::BadRequest("The email change link is invalid or has expired".to_string())
        })?;

        if self.user_repo.find_by_email(&new_email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let mut model = user.into_active_model();
        model.avatar_hash = Set(Some(gravatar_hash(&new_email)));
        model.email = Set(new_email);
        self.user_repo.update(model).await
    }

    /// Update the caller's own profile fields.
    pub async fn update_profile(
        &self,
        user: user::Model,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let mut model = user.into_active_model();
        model.name = Set(input.name);
        model.location = Set(input.location);
        model.about_me = Set(input.about_me);
        self.user_repo.update(model).await
    }

    /// Update any user's profile, credentials included. Administrators only;
    /// the permission check lives in the API layer.
    pub async fn admin_update_profile(
        &self,
        user_id: &str,
        input: AdminUpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(user_id).await?;
        let mut model = user.clone().into_active_model();

        if let Some(email) = input.email {
            if email != user.email {
                if self.user_repo.find_by_email(&email).await?.is_some() {
                    return Err(AppError::Conflict("Email already registered".to_string()));
                }
                model.avatar_hash = Set(Some(gravatar_hash(&email)));
                model.email = Set(email);
            }
        }
        if let Some(username) = input.username {
            if username != user.username {
                if !valid_username(&username) {
                    return Err(AppError::BadRequest(
                        "Usernames must start with a letter and contain only letters, numbers, dots or underscores".to_string(),
                    ));
                }
                if self.user_repo.find_by_username(&username).await?.is_some() {
                    return Err(AppError::Conflict("Username already in use".to_string()));
                }
                model.username = Set(username);
            }
        }
        if let Some(confirmed) = input.confirmed {
            model.confirmed = Set(confirmed);
        }
        if let Some(role_id) = input.role_id {
            // Reject unknown role IDs up front.
            self.role_service.get_by_id(&role_id).await?;
            model.role_id = Set(role_id);
        }
        model.name = Set(input.name);
        model.location = Set(input.location);
        model.about_me = Set(input.about_me);

        self.user_repo.update(model).await
    }

    /// Record account activity by refreshing `last_seen`.
    pub async fn ping(&self, user: user::Model) -> AppResult<user::Model> {
        let mut model = user.into_active_model();
        model.last_seen = Set(Utc::now().fixed_offset());
        self.user_repo.update(model).await
    }

    /// Find a user by username.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        self.user_repo.find_by_username(username).await
    }

    /// Get a user by ID, failing when absent.
    pub async fn get_by_id(&self, user_id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(user_id).await
    }
}

/// Gravatar-style avatar hash: MD5 of the lowercased address.
#[must_use]
pub fn gravatar_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.to_lowercase().as_bytes()))
}

/// Usernames start with a letter and use letters, digits, dots or underscores.
fn valid_username(username: &str) -> bool {
    let mut chars = username.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
