use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::Message;
use postier::mail::{
    Connector, ContentKind, DeliveryError, DeliveryErrorKind, Mailer, MailerConfig, OutgoingMail,
    SmtpMailer, SmtpSession, SmtpTarget, HTML_FALLBACK_TEXT,
};

#[derive(Default)]
struct Log {
    open_attempts: usize,
    opened: usize,
    closed: usize,
    targets: Vec<SmtpTarget>,
    credentials: Vec<(String, String)>,
    sent: Vec<String>,
}

#[derive(Clone, Default)]
struct Script {
    fail_open: Option<DeliveryError>,
    fail_auth: Option<DeliveryError>,
    fail_transmit: Option<DeliveryError>,
}

#[derive(Clone, Default)]
struct MockConnector {
    script: Script,
    log: Arc<Mutex<Log>>,
}

struct MockSession {
    script: Script,
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn open(&self, target: &SmtpTarget) -> Result<MockSession, DeliveryError> {
        let mut log = self.log.lock().unwrap();
        log.open_attempts += 1;
        log.targets.push(target.clone());
        if let Some(err) = &self.script.fail_open {
            return Err(err.clone());
        }
        log.opened += 1;
        Ok(MockSession {
            script: self.script.clone(),
            log: self.log.clone(),
        })
    }
}

#[async_trait]
impl SmtpSession for MockSession {
    async fn authenticate(&mut self, login: &str, password: &str) -> Result<(), DeliveryError> {
        if let Some(err) = &self.script.fail_auth {
            return Err(err.clone());
        }
        self.log
            .lock()
            .unwrap()
            .credentials
            .push((login.to_string(), password.to_string()));
        Ok(())
    }

    async fn transmit(&mut self, message: &Message) -> Result<(), DeliveryError> {
        if let Some(err) = &self.script.fail_transmit {
            return Err(err.clone());
        }
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        self.log.lock().unwrap().sent.push(raw);
        Ok(())
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed += 1;
    }
}

fn config() -> MailerConfig {
    MailerConfig {
        host: Some("smtp.example.com".into()),
        login: Some("user".into()),
        password: Some("secret".into()),
        sender: Some("noreply@example.com".into()),
        ..Default::default()
    }
}

fn plain() -> OutgoingMail {
    OutgoingMail::new("dest@example.com", "Bonjour", "Hello there", ContentKind::Plain)
}

fn mailer(script: Script) -> (SmtpMailer<MockConnector>, Arc<Mutex<Log>>) {
    let connector = MockConnector {
        script,
        ..Default::default()
    };
    let log = connector.log.clone();
    (SmtpMailer::with_connector(config(), connector), log)
}

#[tokio::test]
async fn delivers_over_a_fresh_session_and_closes_it() {
    let (mailer, log) = mailer(Script::default());

    mailer.send(&plain()).await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.opened, 1);
    assert_eq!(log.closed, 1);
    assert_eq!(log.targets[0].host, "smtp.example.com");
    assert_eq!(log.targets[0].port, 587);
    assert!(!log.targets[0].implicit_tls());
    assert_eq!(log.credentials, vec![("user".to_string(), "secret".to_string())]);
    assert_eq!(log.sent.len(), 1);
    assert!(log.sent[0].contains("Hello there"));
    assert!(log.sent[0].contains("text/plain"));
}

#[tokio::test]
async fn every_send_gets_its_own_session() {
    let (mailer, log) = mailer(Script::default());

    mailer.send(&plain()).await.unwrap();
    mailer.send(&plain()).await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.opened, 2);
    assert_eq!(log.closed, 2);
    assert_eq!(log.sent.len(), 2);
}

#[tokio::test]
async fn styled_mail_goes_out_as_alternative_parts() {
    let (mailer, log) = mailer(Script::default());
    let mail = OutgoingMail::new("dest@example.com", "Bonjour", "<h2>Hello</h2>", ContentKind::Styled);

    mailer.send(&mail).await.unwrap();

    let log = log.lock().unwrap();
    assert!(log.sent[0].contains("multipart/alternative"));
    assert!(log.sent[0].contains(HTML_FALLBACK_TEXT));
    assert!(log.sent[0].contains("<h2>Hello</h2>"));
}

#[tokio::test]
async fn authentication_failure_still_closes_the_session() {
    let (mailer, log) = mailer(Script {
        fail_auth: Some(DeliveryError::new(
            DeliveryErrorKind::Authentication,
            "535 5.7.8 bad credentials",
        )),
        ..Default::default()
    });

    let err = mailer.send(&plain()).await.unwrap_err();

    assert_eq!(err.kind(), DeliveryErrorKind::Authentication);
    let log = log.lock().unwrap();
    assert_eq!(log.closed, 1);
    assert!(log.sent.is_empty());
}

#[tokio::test]
async fn transmit_failure_still_closes_the_session() {
    let (mailer, log) = mailer(Script {
        fail_transmit: Some(DeliveryError::new(
            DeliveryErrorKind::Disconnected,
            "connection reset",
        )),
        ..Default::default()
    });

    let err = mailer.send(&plain()).await.unwrap_err();

    assert_eq!(err.kind(), DeliveryErrorKind::Disconnected);
    assert_eq!(log.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn a_failed_send_does_not_affect_the_next_one() {
    let connector = MockConnector {
        script: Script {
            fail_transmit: Some(DeliveryError::new(DeliveryErrorKind::Timeout, "timed out")),
            ..Default::default()
        },
        ..Default::default()
    };
    let log = connector.log.clone();
    let failing = SmtpMailer::with_connector(config(), connector);
    assert_eq!(
        failing.send(&plain()).await.unwrap_err().kind(),
        DeliveryErrorKind::Timeout
    );

    let healthy = SmtpMailer::with_connector(
        config(),
        MockConnector {
            script: Script::default(),
            log: log.clone(),
        },
    );
    healthy.send(&plain()).await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.opened, 2);
    assert_eq!(log.closed, 2);
    assert_eq!(log.sent.len(), 1);
}

#[tokio::test]
async fn connect_failure_leaves_nothing_to_close() {
    let (mailer, log) = mailer(Script {
        fail_open: Some(DeliveryError::new(
            DeliveryErrorKind::NameResolution,
            "no such host",
        )),
        ..Default::default()
    });

    let err = mailer.send(&plain()).await.unwrap_err();

    assert_eq!(err.kind(), DeliveryErrorKind::NameResolution);
    let log = log.lock().unwrap();
    assert_eq!(log.open_attempts, 1);
    assert_eq!(log.opened, 0);
    assert_eq!(log.closed, 0);
}

#[tokio::test]
async fn missing_configuration_never_connects() {
    let connector = MockConnector::default();
    let log = connector.log.clone();
    let mailer = SmtpMailer::with_connector(
        MailerConfig {
            password: None,
            ..config()
        },
        connector,
    );

    let err = mailer.send(&plain()).await.unwrap_err();

    assert_eq!(err.kind(), DeliveryErrorKind::MissingConfiguration);
    assert!(err.message().contains("SMTP_PASSWORD"));
    assert_eq!(log.lock().unwrap().open_attempts, 0);
}

#[tokio::test]
async fn invalid_recipient_never_connects() {
    let (mailer, log) = mailer(Script::default());
    let mail = OutgoingMail::new("not-an-address", "Bonjour", "Hello", ContentKind::Plain);

    let err = mailer.send(&mail).await.unwrap_err();

    assert_eq!(err.kind(), DeliveryErrorKind::InvalidAddress);
    assert_eq!(log.lock().unwrap().open_attempts, 0);
}

#[tokio::test]
async fn port_465_targets_implicit_tls() {
    let connector = MockConnector::default();
    let log = connector.log.clone();
    let mailer = SmtpMailer::with_connector(
        MailerConfig {
            port: 465,
            ..config()
        },
        connector,
    );

    mailer.send(&plain()).await.unwrap();

    assert!(log.lock().unwrap().targets[0].implicit_tls());
}

#[test]
fn reason_codes_are_stable() {
    let codes: Vec<&str> = [
        DeliveryErrorKind::MissingConfiguration,
        DeliveryErrorKind::InvalidAddress,
        DeliveryErrorKind::Authentication,
        DeliveryErrorKind::Connect,
        DeliveryErrorKind::Disconnected,
        DeliveryErrorKind::NameResolution,
        DeliveryErrorKind::Timeout,
        DeliveryErrorKind::Other,
    ]
    .iter()
    .map(|k| k.code())
    .collect();

    assert_eq!(
        codes,
        [
            "missing_configuration",
            "invalid_address",
            "authentication",
            "connect",
            "disconnected",
            "name_resolution",
            "timeout",
            "other",
        ]
    );
}
