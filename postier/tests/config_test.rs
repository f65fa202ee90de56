use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use postier::config::{EnvConfig, ServerConfig};
use postier::enhance::{EnhancerConfig, DEFAULT_MODEL};
use postier::mail::MailerConfig;
use postier::queue::{QueueConfig, WorkerConfig};

// Each test uses its own prefix so tests running in parallel do not see
// each other's variables.

#[test]
fn mailer_config_reads_smtp_settings() {
    std::env::set_var("MAILCFG_SMTP_SERVER", "smtp.example.com");
    std::env::set_var("MAILCFG_SMTP_PORT", "465");
    std::env::set_var("MAILCFG_SMTP_LOGIN", "user");
    std::env::set_var("MAILCFG_SMTP_PASSWORD", "secret");
    std::env::set_var("MAILCFG_SENDER_EMAIL", "noreply@example.com");

    let config = MailerConfig::from_env_with_prefix("MAILCFG").unwrap();

    assert_eq!(config.host.as_deref(), Some("smtp.example.com"));
    assert_eq!(config.port, 465);
    assert_eq!(config.login.as_deref(), Some("user"));
    assert_eq!(config.password.as_deref(), Some("secret"));
    assert_eq!(config.sender.as_deref(), Some("noreply@example.com"));
    assert_eq!(config.timeout, 15);

    for key in [
        "SMTP_SERVER",
        "SMTP_PORT",
        "SMTP_LOGIN",
        "SMTP_PASSWORD",
        "SENDER_EMAIL",
    ] {
        std::env::remove_var(format!("MAILCFG_{key}"));
    }
}

#[test]
fn mailer_config_loads_without_smtp_settings() {
    let config = MailerConfig::from_env_with_prefix("NOMAILCFG").unwrap();

    assert!(config.host.is_none());
    assert!(config.login.is_none());
    assert!(config.password.is_none());
    assert!(config.sender.is_none());
    assert_eq!(config.port, 587);
    assert_eq!(config.timeout, 15);
}

#[test]
fn enhancer_config_defaults() {
    std::env::set_var("ENHCFG_GEMINI_API_KEY", "key");

    let config = EnhancerConfig::from_env_with_prefix("ENHCFG").unwrap();

    assert_eq!(config.api_key(), Some("key"));
    assert_eq!(config.model, DEFAULT_MODEL);
    assert_eq!(config.log_dir, PathBuf::from("gemini_logs"));

    std::env::remove_var("ENHCFG_GEMINI_API_KEY");
}

#[test]
fn enhancer_config_overrides() {
    std::env::set_var("ENHCFG2_GEMINI_MODEL", "gemini-other");
    std::env::set_var("ENHCFG2_GEMINI_BASE_URL", "http://localhost:9999");
    std::env::set_var("ENHCFG2_GEMINI_LOG_DIR", "/tmp/journal");

    let config = EnhancerConfig::from_env_with_prefix("ENHCFG2").unwrap();

    assert!(config.api_key().is_none());
    assert_eq!(config.model, "gemini-other");
    assert_eq!(config.base_url, "http://localhost:9999");
    assert_eq!(config.log_dir, PathBuf::from("/tmp/journal"));

    std::env::remove_var("ENHCFG2_GEMINI_MODEL");
    std::env::remove_var("ENHCFG2_GEMINI_BASE_URL");
    std::env::remove_var("ENHCFG2_GEMINI_LOG_DIR");
}

#[test]
fn server_config_defaults_to_port_5001() {
    let config = ServerConfig::from_env_with_prefix("SRVCFG").unwrap();

    assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(config.port, 5001);
}

#[test]
fn server_config_with_prefix() {
    std::env::set_var("SRVCFG2_HOST", "127.0.0.1");
    std::env::set_var("SRVCFG2_PORT", "8080");

    let config = ServerConfig::from_env_with_prefix("SRVCFG2").unwrap();

    assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(config.port, 8080);

    std::env::remove_var("SRVCFG2_HOST");
    std::env::remove_var("SRVCFG2_PORT");
}

#[test]
fn queue_and_worker_settings() {
    std::env::set_var("QCFG_QUEUE_URL", "postgres://db/mail");
    std::env::set_var("QCFG_WORKER_CONCURRENCY", "8");

    let queue = QueueConfig::from_env_with_prefix("QCFG").unwrap();
    let worker = WorkerConfig::from_env_with_prefix("QCFG").unwrap();

    assert_eq!(queue.queue_url, "postgres://db/mail");
    assert_eq!(queue.queue_max_connections, 10);
    assert_eq!(queue.queue_lock_timeout, 300);
    assert_eq!(worker.worker_concurrency, 8);
    assert_eq!(worker.worker_poll_interval_ms, 1000);

    std::env::remove_var("QCFG_QUEUE_URL");
    std::env::remove_var("QCFG_WORKER_CONCURRENCY");
}
