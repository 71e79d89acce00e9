//! Outgoing email. The notification contract is boolean: `Ok(false)` means
//! delivery failed and the caller must treat the enclosing unit of work as
//! failed. Transport problems are logged here, never surfaced as errors.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::EmailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Returns `Ok(false)` on delivery failure rather than an error.
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<bool>;
}

/// SMTP mailer over lettre's async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_mailbox: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &EmailConfig) -> anyhow::Result<Self> {
        let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid from address: {e}"))?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| anyhow::anyhow!("Failed to build SMTP transport: {e}"))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder.port(config.smtp_port);

        if let (Some(username), Some(password)) = (config.smtp_username(), config.smtp_password()) {
            builder = builder.credentials(Credentials::new(username, password));
        } else {
            warn!("SMTP credentials not configured; delivery will likely fail");
        }

        Ok(Self {
            transport: builder.build(),
            from_mailbox,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<bool> {
        let to_mailbox: Mailbox = match to.parse() {
            Ok(mb) => mb,
            Err(e) => {
                warn!("Refusing to send email to invalid address {to}: {e}");
                return Ok(false);
            }
        };

        let message = Message::builder()
            .from(self.from_mailbox.clone())
            .to(to_mailbox)
            .subject(subject)
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html_body.to_string()),
            );

        let message = match message {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to build email message for {to}: {e}");
                return Ok(false);
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                info!("Email sent to {to}: {subject}");
                Ok(true)
            }
            Err(e) => {
                error!("Failed to send email to {to}: {e}");
                Ok(false)
            }
        }
    }
}

/// Development mailer: logs the message instead of sending it, and reports
/// success so local provisioning flows stay usable without an SMTP server.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<bool> {
        info!("Email delivery disabled; would send to {to}: {subject}\n{html_body}");
        Ok(true)
    }
}

/// Recording mailer for tests: captures every message and can be switched
/// into a failing mode to exercise rollback paths.
#[derive(Default)]
pub struct StubMailer {
    pub outbox: Mutex<Vec<SentEmail>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl StubMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox.lock().expect("outbox poisoned").clone()
    }
}

#[async_trait]
impl Mailer for StubMailer {
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<bool> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Ok(false);
        }

        self.outbox.lock().expect("outbox poisoned").push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });

        Ok(true)
    }
}
