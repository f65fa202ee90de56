//! One SMTP session per send.
//!
//! [`Connector`] opens a session against an [`SmtpTarget`]; [`SmtpSession`]
//! authenticates, transmits and closes it. The lettre-backed implementation
//! resolves the host itself so name resolution failures get their own code.

use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;

use super::{DeliveryError, DeliveryErrorKind};

/// Implicit TLS port. Every other port negotiates STARTTLS.
pub const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl SmtpTarget {
    pub fn implicit_tls(&self) -> bool {
        self.port == IMPLICIT_TLS_PORT
    }
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: SmtpSession;

    async fn open(&self, target: &SmtpTarget) -> Result<Self::Session, DeliveryError>;
}

#[async_trait]
pub trait SmtpSession: Send {
    async fn authenticate(&mut self, login: &str, password: &str) -> Result<(), DeliveryError>;

    async fn transmit(&mut self, message: &Message) -> Result<(), DeliveryError>;

    /// Release the connection. Errors are logged, never returned.
    async fn close(&mut self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LettreConnector;

pub struct LettreSession {
    conn: AsyncSmtpConnection,
}

#[async_trait]
impl Connector for LettreConnector {
    type Session = LettreSession;

    async fn open(&self, target: &SmtpTarget) -> Result<LettreSession, DeliveryError> {
        let addr = resolve(target).await?;
        let hello = ClientId::default();
        let tls = TlsParameters::new(target.host.clone()).map_err(|e| {
            DeliveryError::new(
                DeliveryErrorKind::Connect,
                format!("invalid TLS parameters for {}: {e}", target.host),
            )
        })?;

        tracing::debug!(host = %target.host, port = target.port, implicit_tls = target.implicit_tls(), "connecting to SMTP server");

        let mut conn = if target.implicit_tls() {
            AsyncSmtpConnection::connect_tokio1(addr, Some(target.timeout), &hello, Some(tls), None)
                .await
                .map_err(|e| from_smtp(Stage::Connect, e))?
        } else {
            let mut conn =
                AsyncSmtpConnection::connect_tokio1(addr, Some(target.timeout), &hello, None, None)
                    .await
                    .map_err(|e| from_smtp(Stage::Connect, e))?;
            if let Err(e) = conn.starttls(tls, &hello).await {
                conn.abort().await;
                return Err(from_smtp(Stage::Connect, e));
            }
            conn
        };

        if !conn.is_encrypted() {
            conn.abort().await;
            return Err(DeliveryError::new(
                DeliveryErrorKind::Connect,
                format!("no TLS session established with {}", target.host),
            ));
        }

        Ok(LettreSession { conn })
    }
}

#[async_trait]
impl SmtpSession for LettreSession {
    async fn authenticate(&mut self, login: &str, password: &str) -> Result<(), DeliveryError> {
        let credentials = Credentials::new(login.to_owned(), password.to_owned());
        self.conn
            .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
            .await
            .map(|_| ())
            .map_err(|e| from_smtp(Stage::Authenticate, e))
    }

    async fn transmit(&mut self, message: &Message) -> Result<(), DeliveryError> {
        self.conn
            .send(message.envelope(), &message.formatted())
            .await
            .map(|_| ())
            .map_err(|e| from_smtp(Stage::Transmit, e))
    }

    async fn close(&mut self) {
        if let Err(e) = self.conn.quit().await {
            tracing::debug!(error = %e, "SMTP QUIT failed, dropping connection");
            self.conn.abort().await;
        }
    }
}

async fn resolve(target: &SmtpTarget) -> Result<SocketAddr, DeliveryError> {
    let lookup = tokio::net::lookup_host((target.host.as_str(), target.port));
    let addrs = tokio::time::timeout(target.timeout, lookup)
        .await
        .map_err(|_| {
            DeliveryError::new(
                DeliveryErrorKind::Timeout,
                format!("timed out resolving {}", target.host),
            )
        })?
        .map_err(|e| {
            DeliveryError::new(
                DeliveryErrorKind::NameResolution,
                format!("could not resolve SMTP server {}: {e}", target.host),
            )
        })?
        .collect::<Vec<_>>();

    addrs.into_iter().next().ok_or_else(|| {
        DeliveryError::new(
            DeliveryErrorKind::NameResolution,
            format!("no address found for SMTP server {}", target.host),
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Connect,
    Authenticate,
    Transmit,
}

/// Reply code a server sends before closing the transmission channel.
const SERVICE_CLOSING: u16 = 421;

/// lettre reports EOF before a complete reply with this response error.
const INCOMPLETE_RESPONSE: &str = "incomplete response";

fn from_smtp(stage: Stage, err: lettre::transport::smtp::Error) -> DeliveryError {
    let kind = if hung_up(&err) {
        DeliveryErrorKind::Disconnected
    } else if stage == Stage::Authenticate && err.is_permanent() {
        DeliveryErrorKind::Authentication
    } else {
        classify(stage, &err)
    };
    DeliveryError::new(kind, err.to_string())
}

/// Whether the server closed the connection, either silently or with a 421.
fn hung_up(err: &lettre::transport::smtp::Error) -> bool {
    if err.is_transport_shutdown() || err.status().map(u16::from) == Some(SERVICE_CLOSING) {
        return true;
    }
    err.is_response()
        && err
            .source()
            .is_some_and(|source| source.to_string() == INCOMPLETE_RESPONSE)
}

/// Map an error to a reason code by walking its source chain for I/O errors,
/// falling back to the stage it happened in.
pub(crate) fn classify(stage: Stage, err: &(dyn StdError + 'static)) -> DeliveryErrorKind {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => return DeliveryErrorKind::Timeout,
                io::ErrorKind::ConnectionRefused
                | io::ErrorKind::AddrNotAvailable
                | io::ErrorKind::NotConnected => return DeliveryErrorKind::Connect,
                io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => return DeliveryErrorKind::Disconnected,
                _ => {}
            }
        }
        source = e.source();
    }

    match stage {
        Stage::Connect => DeliveryErrorKind::Connect,
        Stage::Authenticate | Stage::Transmit => DeliveryErrorKind::Other,
    }
}
