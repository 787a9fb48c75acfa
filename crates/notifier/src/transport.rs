//! Outbound mail transports.
//!
//! [`MailTransport`] is the seam between the dispatcher and the mail relay:
//! it accepts one `{to, subject, text}` message and either completes or
//! fails. Retries, if any, belong to the transport.
//!
//! - [`SmtpTransport`] — `lettre` async SMTP relay (STARTTLS).
//! - [`LogTransport`] — logs the message instead of sending it; used when no
//!   relay is configured.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use confernet_common::config::AppConfig;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for mail delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The relay refused or could not be reached.
    #[error("Mail relay unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// MailTransport
// ---------------------------------------------------------------------------

/// A single plain-text message handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Sends one message. Implementations must be shareable across tasks.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), TransportError>;
}

/// Build the transport selected by configuration: SMTP when `SMTP_HOST` is
/// set, otherwise [`LogTransport`].
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn MailTransport>, TransportError> {
    match &config.smtp_host {
        Some(host) => {
            let transport = SmtpTransport::new(
                host,
                config.smtp_port,
                &config.email_from,
                config.smtp_user.clone().zip(config.smtp_password.clone()),
            )?;
            tracing::info!(host = %host, port = config.smtp_port, "SMTP mail transport configured");
            Ok(Arc::new(transport))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, notification mail will only be logged");
            Ok(Arc::new(LogTransport))
        }
    }
}

// ---------------------------------------------------------------------------
// SmtpTransport
// ---------------------------------------------------------------------------

/// Delivers mail through an SMTP relay.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    /// Build the relay client. The connection is opened lazily on first send.
    pub fn new(
        host: &str,
        port: u16,
        from: &str,
        credentials: Option<(String, String)>,
    ) -> Result<Self, TransportError> {
        let from: Mailbox = from.parse()?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(port);

        if let Some((user, pass)) = credentials {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message.to.parse()?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.text.clone())
            .map_err(|e| TransportError::Build(e.to_string()))?;

        self.mailer.send(email).await?;

        tracing::debug!(to = %message.to, "Notification email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LogTransport
// ---------------------------------------------------------------------------

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Mail relay not configured, message logged only"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> MailMessage {
        MailMessage {
            to: to.to_string(),
            subject: "Subject".to_string(),
            text: "Body".to_string(),
        }
    }

    #[test]
    fn test_error_display_build() {
        let err = TransportError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[test]
    fn test_error_display_address() {
        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = TransportError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[test]
    fn test_smtp_rejects_bad_sender() {
        let result = SmtpTransport::new("localhost", 2525, "not a mailbox", None);
        assert!(matches!(result, Err(TransportError::Address(_))));
    }

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        assert!(LogTransport.send(&message("ada@example.com")).await.is_ok());
    }

    #[test]
    fn test_from_config_without_smtp_host() {
        let config = AppConfig {
            database_url: "postgres://unused".to_string(),
            db_max_connections: 1,
            api_port: 5003,
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_password: None,
            email_from: "ConferNet <noreply@confernet.local>".to_string(),
        };
        assert!(from_config(&config).is_ok());
    }
}
