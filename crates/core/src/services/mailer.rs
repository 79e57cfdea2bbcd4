//! Outbound mail service.

use iblog_common::{AppError, AppResult, config::MailConfig};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Outbound mail service backed by SMTP.
///
/// Constructed without mail configuration it becomes a no-op, so the
/// rest of the application never needs to check whether mail is set up.
#[derive(Clone)]
pub struct MailerService {
    inner: Option<MailerInner>,
    server_url: String,
}

#[derive(Clone)]
struct MailerInner {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    subject_prefix: String,
}

impl MailerService {
    /// Create a new mailer from optional SMTP configuration.
    pub fn new(config: Option<&MailConfig>, server_url: String) -> AppResult<Self> {
        let inner = match config {
            Some(mail) => Some(MailerInner::build(mail)?),
            None => None,
        };
        Ok(Self { inner, server_url })
    }

    /// Check whether outbound mail is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Send the account confirmation email.
    pub fn send_confirmation(&self, to: &str, username: &str, token: &str) {
        let link = format!("{}/auth/confirm/{token}", self.server_url);
        let text = format!(
            "Dear {username},\n\n\
            Welcome to IBlog!\n\n\
            To confirm your account please click on the following link:\n\n\
            {link}\n\n\
            Sincerely,\n\nThe IBlog Team\n\n\
            Note: replies to this email address are not monitored.",
        );
        let html = format!(
            "<p>Dear {username},</p>\
            <p>Welcome to <b>IBlog</b>!</p>\
            <p>To confirm your account please <a href=\"{link}\">click here</a>.</p>\
            <p>Alternatively, you can paste the following link in your browser's address bar:</p>\
            <p>{link}</p>\
            <p>Sincerely,</p>\
            <p>The IBlog Team</p>\
            <p><small>Note: replies to this email address are not monitored.</small></p>",
        );
        self.send(to, "Confirm Your Account", text, html);
    }

    /// Send the password reset email.
    pub fn send_password_reset(&self, to: &str, username: &str, token: &str) {
        let link = format!("{}/auth/reset/{token}", self.server_url);
        let text = format!(
            "Dear {username},\n\n\
            To reset your password click on the following link:\n\n\
            {link}\n\n\
            If you have not requested a password reset simply ignore this message.\n\n\
            Sincerely,\n\nThe IBlog Team",
        );
        let html = format!(
            "<p>Dear {username},</p>\
            <p>To reset your password <a href=\"{link}\">click here</a>.</p>\
            <p>Alternatively, you can paste the following link in your browser's address bar:</p>\
            <p>{link}</p>\
            <p>If you have not requested a password reset simply ignore this message.</p>\
            <p>Sincerely,</p>\
            <p>The IBlog Team</p>",
        );
        self.send(to, "Reset Your Password", text, html);
    }

    /// Send the email address change confirmation to the new address.
    pub fn send_email_change(&self, to: &str, username: &str, token: &str) {
        let link = format!("{}/auth/change_email/{token}", self.server_url);
        let text = format!(
            "Dear {username},\n\n\
            To confirm your new email address click on the following link:\n\n\
            {link}\n\n\
            If you have not requested an email address change simply ignore this message.\n\n\
            Sincerely,\n\nThe IBlog Team",
        );
        let html = format!(
            "<p>Dear {username},</p>\
            <p>To confirm your new email address <a href=\"{link}\">click here</a>.</p>\
            <p>Alternatively, you can paste the following link in your browser's address bar:</p>\
            <p>{link}</p>\
            <p>If you have not requested an email address change simply ignore this message.</p>\
            <p>Sincerely,</p>\
            <p>The IBlog Team</p>",
        );
        self.send(to, "Confirm Your Email Address", text, html);
    }

    /// Send a message in the background. Delivery failures are logged,
    /// never surfaced to the request that triggered the mail.
    fn send(&self, to: &str, subject: &str, text: String, html: String) {
        let Some(inner) = self.inner.clone() else {
            tracing::debug!(to, subject, "Mail disabled, dropping message");
            return;
        };

        let recipient: Mailbox = match to.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::warn!(to, error = %e, "Invalid recipient address, dropping message");
                return;
            }
        };

        let subject = format!("{} {subject}", inner.subject_prefix);
        let message = Message::builder()
            .from(inner.sender.clone())
            .to(recipient)
            .subject(&subject)
            .multipart(MultiPart::alternative_plain_html(text, html));

        let message = match message {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(to, error = %e, "Failed to build message");
                return;
            }
        };

        let to = to.to_string();
        tokio::spawn(async move {
            match inner.transport.send(message).await {
                Ok(_) => tracing::debug!(to, subject, "Sent mail"),
                Err(e) => tracing::warn!(to, subject, error = %e, "Failed to send mail"),
            }
        });
    }
}

impl MailerInner {
    fn build(config: &MailConfig) -> AppResult<Self> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
                .map_err(|e| AppError::Mail(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid sender address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            sender,
            subject_prefix: config.subject_prefix.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_mailer_is_disabled() {
        let mailer = MailerService::new(None, "http://localhost:3000".to_string()).unwrap();
        assert!(!mailer.is_enabled());
        // Sending through a disabled mailer is a silent no-op.
        mailer.send_confirmation("joe@example.com", "joe", "tok");
    }

    #[tokio::test]
    async fn test_configured_mailer_is_enabled() {
        let config = MailConfig {
            server: "smtp.example.com".to_string(),
            port: 587,
            use_tls: false,
            username: Some("mailer".to_string()),
            password: Some("secret".to_string()),
            sender: "IBlog Admin <admin@iblog.example>".to_string(),
            subject_prefix: "[IBlog]".to_string(),
        };
        let mailer =
            MailerService::new(Some(&config), "http://localhost:3000".to_string()).unwrap();
        assert!(mailer.is_enabled());
    }

    #[tokio::test]
    async fn test_invalid_sender_is_rejected() {
        let config = MailConfig {
            server: "smtp.example.com".to_string(),
            port: 587,
            use_tls: false,
            username: None,
            password: None,
            sender: "not an address".to_string(),
            subject_prefix: "[IBlog]".to_string(),
        };
        let result = MailerService::new(Some(&config), "http://localhost:3000".to_string());
        assert!(matches!(result, Err(AppError::Mail(_))));
    }
}
