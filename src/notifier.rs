use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::address::{Address, Envelope};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};

use crate::{SMTP_HOST, SMTP_PORT};

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Email {
    /// Render `From`, `To` and `Subject` header lines, a blank line, then the body.
    pub fn render(&self) -> String {
        let body = self.body.replace("\r\n", "\n").replace('\n', "\r\n");
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\n\r\n{body}",
            self.from,
            self.to.join(","),
            self.subject
        )
    }

    fn envelope(&self) -> Result<Envelope> {
        let from: Address = self
            .from
            .parse()
            .with_context(|| format!("invalid sender address {}", self.from))?;
        let to = self
            .to
            .iter()
            .map(|addr| {
                addr.parse::<Address>()
                    .with_context(|| format!("invalid recipient address {addr}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Envelope::new(Some(from), to).context("failed to build envelope")
    }
}

/// Delivers alert emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `email`, authenticating as its sender with `password`.
    async fn send(&self, email: &Email, password: &SecretString) -> Result<()>;
}

/// SMTP mailer: connect, STARTTLS, authenticate, send, close.
///
/// A new session is opened for every message, so credential changes picked
/// up from a config reload take effect on the next alert.
pub struct SmtpMailer {
    host: String,
    port: u16,
    timeout: Option<Duration>,
}

impl SmtpMailer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: None,
        }
    }

    /// Mailer for the Gmail submission port.
    pub fn gmail() -> Self {
        Self::new(SMTP_HOST, SMTP_PORT)
    }

    /// Bound each SMTP command by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email, password: &SecretString) -> Result<()> {
        let envelope = email.envelope()?;
        let credentials = Credentials::new(
            email.from.clone(),
            password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .with_context(|| format!("failed to configure SMTP relay {}", self.host))?
            .port(self.port)
            .credentials(credentials)
            .timeout(self.timeout)
            .build();

        transport
            .send_raw(&envelope, email.render().as_bytes())
            .await
            .with_context(|| format!("SMTP delivery via {}:{} failed", self.host, self.port))?;
        Ok(())
    }
}

/// Send an alert, logging any failure instead of returning it.
///
/// Returns whether the message was accepted by the mail server.
pub async fn notify(mailer: &dyn Mailer, email: &Email, password: &SecretString) -> bool {
    debug!("Alerting {:?} ...", email.to);
    match mailer.send(email, password).await {
        Ok(()) => {
            info!("Sent alert \"{}\" to {} recipient(s)", email.subject, email.to.len());
            true
        }
        Err(e) => {
            error!("Failed to send alerts: {e:?}");
            false
        }
    }
}
