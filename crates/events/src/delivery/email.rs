//! Welcome e-mail delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send a
//! plain-text welcome message for a [`UserRegisteredEvent`]. Configuration
//! is loaded from environment variables; if `SMTP_HOST` is not set,
//! [`EmailConfig::from_env`] returns `None` and the worker falls back to
//! [`WelcomeLogger`](crate::handler::WelcomeLogger).

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::HandlerError;
use crate::event::UserRegisteredEvent;
use crate::handler::EventHandler;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

impl From<EmailError> for HandlerError {
    /// Only SMTP errors that are not permanent rejections are worth a retry.
    fn from(err: EmailError) -> Self {
        match &err {
            EmailError::Transport(e) if !e.is_permanent() => HandlerError::Transient(err.to_string()),
            _ => HandlerError::Permanent(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@filmnesia.local";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable        | Required | Default                    |
    /// |-----------------|----------|----------------------------|
    /// | `SMTP_HOST`     | yes      | -                          |
    /// | `SMTP_PORT`     | no       | `587`                      |
    /// | `SMTP_FROM`     | no       | `noreply@filmnesia.local`  |
    /// | `SMTP_USER`     | no       | -                          |
    /// | `SMTP_PASSWORD` | no       | -                          |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends welcome emails over one pooled SMTP transport.
pub struct EmailDelivery {
    from_address: String,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    /// Build the SMTP transport. No connection is made until the first send.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (config.smtp_user, config.smtp_password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            from_address: config.from_address,
            mailer: builder.build(),
        })
    }

    /// Send the welcome email for a freshly registered account.
    pub async fn send_welcome(&self, event: &UserRegisteredEvent) -> Result<(), EmailError> {
        let email = welcome_message(&self.from_address, event)?;
        self.mailer.send(email).await?;

        tracing::info!(user_id = %event.user_id, to = %event.email, "Welcome email sent");
        Ok(())
    }
}

/// Assemble the plain-text welcome message.
fn welcome_message(from: &str, event: &UserRegisteredEvent) -> Result<Message, EmailError> {
    let body = format!(
        "Hi {},\n\nWelcome to Filmnesia! Your account was created on {}.\n",
        event.username,
        event.registered_at.format("%Y-%m-%d %H:%M UTC"),
    );

    Message::builder()
        .from(from.parse()?)
        .to(event.email.parse()?)
        .subject("Welcome to Filmnesia")
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| EmailError::Build(e.to_string()))
}

// ---------------------------------------------------------------------------
// WelcomeMailer
// ---------------------------------------------------------------------------

/// [`EventHandler`] that sends the welcome email.
pub struct WelcomeMailer {
    delivery: EmailDelivery,
}

impl WelcomeMailer {
    pub fn new(delivery: EmailDelivery) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl EventHandler for WelcomeMailer {
    async fn handle(&self, event: &UserRegisteredEvent) -> Result<(), HandlerError> {
        self.delivery.send_welcome(event).await.map_err(HandlerError::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn event(email: &str) -> UserRegisteredEvent {
        UserRegisteredEvent::for_account(Uuid::new_v4(), email, "alice", Utc::now())
    }

    #[test]
    fn from_env_returns_none_without_smtp_host() {
        // Ensure SMTP_HOST is not set in the test environment.
        std::env::remove_var("SMTP_HOST");
        assert!(EmailConfig::from_env().is_none());
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[test]
    fn welcome_message_builds_for_valid_address() {
        assert!(welcome_message("noreply@filmnesia.local", &event("a@example.com")).is_ok());
    }

    #[test]
    fn unparseable_recipient_is_permanent() {
        let err = welcome_message("noreply@filmnesia.local", &event("not-an-email")).unwrap_err();
        assert!(err.to_string().contains("Email address parse error"));
        assert!(!HandlerError::from(err).is_transient());
    }
}
