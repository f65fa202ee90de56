//! Mailer trait and SMTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::message::OutgoingMail;
use super::session::{Connector, LettreConnector, SmtpSession, SmtpTarget};
use super::{DeliveryError, DeliveryErrorKind};

/// Async email sending trait.
///
/// Implement this trait to provide alternative email backends.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError>;
}

/// SMTP settings. Every field is optional at load time; a send with any
/// required value missing fails with [`DeliveryErrorKind::MissingConfiguration`].
#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    #[serde(rename = "smtp_server")]
    pub host: Option<String>,

    #[serde(rename = "smtp_port", default = "default_port")]
    pub port: u16,

    #[serde(rename = "smtp_login")]
    pub login: Option<String>,

    #[serde(rename = "smtp_password")]
    pub password: Option<String>,

    #[serde(rename = "sender_email")]
    pub sender: Option<String>,

    /// Connect and command timeout in seconds.
    #[serde(rename = "smtp_timeout", default = "default_timeout")]
    pub timeout: u64,
}

fn default_port() -> u16 {
    587
}

fn default_timeout() -> u64 {
    15
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            login: None,
            password: None,
            sender: None,
            timeout: default_timeout(),
        }
    }
}

struct Resolved<'a> {
    target: SmtpTarget,
    login: &'a str,
    password: &'a str,
    sender: &'a str,
}

impl MailerConfig {
    fn resolve(&self) -> Result<Resolved<'_>, DeliveryError> {
        fn present<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, DeliveryError> {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    DeliveryError::new(
                        DeliveryErrorKind::MissingConfiguration,
                        format!("{name} is not configured"),
                    )
                })
        }

        let host = present(&self.host, "SMTP_SERVER")?;
        let login = present(&self.login, "SMTP_LOGIN")?;
        let password = present(&self.password, "SMTP_PASSWORD")?;
        let sender = present(&self.sender, "SENDER_EMAIL")?;

        Ok(Resolved {
            target: SmtpTarget {
                host: host.to_string(),
                port: self.port,
                timeout: Duration::from_secs(self.timeout),
            },
            login,
            password,
            sender,
        })
    }
}

/// SMTP mailer opening a fresh session for every send.
///
/// Sessions are never shared between sends, so one failed delivery cannot
/// leave state behind for the next.
pub struct SmtpMailer<C = LettreConnector> {
    config: MailerConfig,
    connector: C,
}

impl SmtpMailer {
    pub fn new(config: MailerConfig) -> Self {
        Self::with_connector(config, LettreConnector)
    }
}

impl<C: Connector> SmtpMailer<C> {
    pub fn with_connector(config: MailerConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &MailerConfig {
        &self.config
    }
}

#[async_trait]
impl<C: Connector> Mailer for SmtpMailer<C> {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        let result = self.deliver(mail).await;
        match &result {
            Ok(()) => tracing::info!(recipient = %mail.recipient, kind = ?mail.kind, "email sent"),
            Err(e) => tracing::warn!(
                recipient = %mail.recipient,
                reason = %e.kind(),
                error = %e.message(),
                "email delivery failed"
            ),
        }
        result
    }
}

impl<C: Connector> SmtpMailer<C> {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        let settings = self.config.resolve()?;
        let message = mail.to_message(settings.sender)?;

        let mut session = self.connector.open(&settings.target).await?;
        let outcome = async {
            session.authenticate(settings.login, settings.password).await?;
            session.transmit(&message).await
        }
        .await;
        session.close().await;
        outcome
    }
}
