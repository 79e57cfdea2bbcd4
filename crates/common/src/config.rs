//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Mail configuration. Absent means outbound mail is disabled.
    #[serde(default)]
    pub mail: Option<MailConfig>,
    /// Application configuration.
    pub app: AppConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Outbound mail (SMTP) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// SMTP server hostname.
    pub server: String,
    /// SMTP server port.
    #[serde(default = "default_mail_port")]
    pub port: u16,
    /// Whether to use STARTTLS.
    #[serde(default = "default_true")]
    pub use_tls: bool,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// From address for outgoing mail.
    #[serde(default = "default_mail_sender")]
    pub sender: String,
    /// Prefix prepended to every subject line.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

/// Application-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Secret key used to sign tokens and session cookies.
    pub secret_key: String,
    /// Email address auto-promoted to the Administrator role at registration.
    #[serde(default)]
    pub admin_email: Option<String>,
    /// Posts per page in listings.
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u64,
    /// Comments per page in listings.
    #[serde(default = "default_comments_per_page")]
    pub comments_per_page: u64,
    /// Followers/following entries per page.
    #[serde(default = "default_followers_per_page")]
    pub followers_per_page: u64,
    /// Session cookie token validity in seconds.
    #[serde(default = "default_session_max_age")]
    pub session_max_age: u64,
    /// Requests slower than this many milliseconds are logged at warn.
    #[serde(default = "default_slow_request_ms")]
    pub slow_request_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_mail_port() -> u16 {
    587
}

const fn default_true() -> bool {
    true
}

fn default_mail_sender() -> String {
    "IBlog Admin <admin@iblog.example>".to_string()
}

fn default_subject_prefix() -> String {
    "[IBlog]".to_string()
}

const fn default_posts_per_page() -> u64 {
    20
}

const fn default_comments_per_page() -> u64 {
    30
}

const fn default_followers_per_page() -> u64 {
    50
}

const fn default_session_max_age() -> u64 {
    // 30 days
    30 * 24 * 3600
}

const fn default_slow_request_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `IBLOG_ENV`)
    /// 3. Environment variables with `IBLOG_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("IBLOG_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("IBLOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("IBLOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
