//! Outbound email
//!
//! The server only ever sends one kind of mail (password reset codes), but
//! it goes through the [`Mailer`] trait so tests and unconfigured setups
//! can swap in a sender that doesn't talk to SMTP.

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// SMTP settings. Built once at startup.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    /// Sender address, e.g. `Tally <no-reply@example.com>`
    pub from: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// The message carrying a password reset code
    pub fn reset_code(to: &str, name: &str, code: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your Tally password reset code".to_string(),
            body: format!(
                "Hello {},\n\n\
                 Use this code to reset your password: {}\n\n\
                 The code expires in 10 minutes. If you did not ask for a reset, \
                 you can ignore this email.\n",
                name, code
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Delivers mail through an SMTP relay using STARTTLS
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| Error::Email(format!("Invalid from address {}: {}", config.from, e)))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| Error::Email(format!("Invalid SMTP relay {}: {}", config.smtp_host, e)))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| Error::Email(format!("Invalid destination {}: {}", message.to, e)))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| Error::Email(e.to_string()))?;

        self.transport.send(email).await.map_err(|e| {
            warn!(error = %e, "SMTP delivery failed");
            Error::Email(e.to_string())
        })?;
        info!(to = %message.to, "Email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
///
/// Used when no SMTP relay is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        // Body may hold a reset code: debug only
        info!(
            to = %message.to,
            subject = %message.subject,
            "SMTP not configured, logging email instead of sending"
        );
        debug!(to = %message.to, body = %message.body, "Unsent email body");
        Ok(())
    }
}

/// Keeps every message in memory so callers can inspect what was sent
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| Error::Email("Mailbox lock poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}
