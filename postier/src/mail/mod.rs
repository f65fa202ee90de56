//! Email delivery over SMTP.
//!
//! A thin layer over [lettre](https://lettre.rs): [`SmtpMailer`] resolves the
//! configured server, opens one session per send through a [`Connector`],
//! authenticates, transmits, and always closes the session before returning.
//! Failures come back as a [`DeliveryError`] carrying a [`DeliveryErrorKind`]
//! reason code, so callers never parse error text.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `SMTP_SERVER` | Yes | SMTP server hostname |
//! | `SMTP_PORT` | No | Port (default: 587). 465 uses implicit TLS, anything else STARTTLS |
//! | `SMTP_LOGIN` | Yes | Username for authentication |
//! | `SMTP_PASSWORD` | Yes | Password for authentication |
//! | `SENDER_EMAIL` | Yes | Sender address |
//! | `SMTP_TIMEOUT` | No | Connect/command timeout in seconds (default: 15) |
//!
//! Missing required values are reported on each send as
//! [`DeliveryErrorKind::MissingConfiguration`], not at startup.

mod mailer;
mod message;
mod session;

pub use mailer::{Mailer, MailerConfig, SmtpMailer};
pub use message::{ContentKind, OutgoingMail, HTML_FALLBACK_TEXT};
pub use session::{Connector, LettreConnector, LettreSession, SmtpSession, SmtpTarget};

use serde::Serialize;

/// Classified reason for a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    MissingConfiguration,
    InvalidAddress,
    Authentication,
    Connect,
    Disconnected,
    NameResolution,
    Timeout,
    Other,
}

impl DeliveryErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingConfiguration => "missing_configuration",
            Self::InvalidAddress => "invalid_address",
            Self::Authentication => "authentication",
            Self::Connect => "connect",
            Self::Disconnected => "disconnected",
            Self::NameResolution => "name_resolution",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DeliveryError {
    kind: DeliveryErrorKind,
    message: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> DeliveryErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
