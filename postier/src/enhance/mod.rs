//! Optional rewriting of a plain-text body into styled HTML.
//!
//! [`Enhancer::enhance`] never returns an error: every failure is folded into
//! an [`EnhancementOutcome`] so the caller can always degrade to something
//! deliverable.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `GEMINI_API_KEY` | No | API key. Without it every attempt fails without a network call |
//! | `GEMINI_MODEL` | No | Model name (default: `gemini-2.5-flash-preview-04-17`) |
//! | `GEMINI_BASE_URL` | No | API root (default: `https://generativelanguage.googleapis.com`) |
//! | `GEMINI_LOG_DIR` | No | Journal directory (default: `gemini_logs`) |

mod gemini;
pub mod journal;
pub mod markup;
pub mod prompt;

pub use gemini::{GeminiEnhancer, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use journal::Journal;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait Enhancer: Send + Sync + 'static {
    async fn enhance(&self, raw: &str, subject: &str) -> EnhancementOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnhanceError {
    #[error("Clé API Gemini manquante.")]
    MissingApiKey,
    #[error("Message brut vide fourni pour l'amélioration.")]
    EmptyMessage,
    #[error("Génération bloquée par Gemini. Raison: {0}")]
    Blocked(String),
    #[error("Réponse vide de Gemini sans raison de blocage spécifiée.")]
    EmptyResponse,
    #[error("Erreur lors de l'appel à l'API Gemini: {0}")]
    Transport(String),
    #[error("Erreur lors de l'appel à l'API Gemini: HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Réponse illisible de Gemini: {0}")]
    Malformed(String),
    #[error("Réponse traitée non-HTML de Gemini")]
    NotMarkup,
}

/// Result of one enhancement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancementOutcome {
    /// Enhancement was not requested.
    NotAttempted,
    Succeeded { body: String },
    /// The service answered with something that is not HTML; `body` wraps
    /// the raw message instead.
    FailedWithFallback { body: String, reason: EnhanceError },
    Failed { reason: EnhanceError },
}

impl EnhancementOutcome {
    pub fn failed(reason: EnhanceError) -> Self {
        Self::Failed { reason }
    }

    pub fn status(&self) -> EnhancementStatus {
        match self {
            Self::NotAttempted => EnhancementStatus::NotAttempted,
            Self::Succeeded { .. } => EnhancementStatus::Succeeded,
            Self::FailedWithFallback { .. } | Self::Failed { .. } => EnhancementStatus::Failed,
        }
    }

    pub fn error(&self) -> Option<&EnhanceError> {
        match self {
            Self::FailedWithFallback { reason, .. } | Self::Failed { reason } => Some(reason),
            Self::NotAttempted | Self::Succeeded { .. } => None,
        }
    }
}

/// Reported enhancement status, as it appears in task results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnhancementStatus {
    #[serde(rename = "non tentée")]
    NotAttempted,
    #[serde(rename = "réussie")]
    Succeeded,
    #[serde(rename = "échouée")]
    Failed,
    /// The enhancer itself crashed.
    #[serde(rename = "échouée (exception)")]
    Crashed,
}

impl EnhancementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAttempted => "non tentée",
            Self::Succeeded => "réussie",
            Self::Failed => "échouée",
            Self::Crashed => "échouée (exception)",
        }
    }
}

impl std::fmt::Display for EnhancementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnhancerConfig {
    #[serde(rename = "gemini_api_key")]
    pub api_key: Option<String>,

    #[serde(rename = "gemini_model", default = "default_model")]
    pub model: String,

    #[serde(rename = "gemini_base_url", default = "default_base_url")]
    pub base_url: String,

    #[serde(rename = "gemini_log_dir", default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("gemini_logs")
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            log_dir: default_log_dir(),
        }
    }
}

impl EnhancerConfig {
    /// The API key, if set and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_reports_status_and_error() {
        let ok = EnhancementOutcome::Succeeded {
            body: "<p>x</p>".into(),
        };
        assert_eq!(ok.status(), EnhancementStatus::Succeeded);
        assert!(ok.error().is_none());

        let fallback = EnhancementOutcome::FailedWithFallback {
            body: "<p>x</p>".into(),
            reason: EnhanceError::NotMarkup,
        };
        assert_eq!(fallback.status(), EnhancementStatus::Failed);
        assert_eq!(
            fallback.error().map(ToString::to_string).as_deref(),
            Some("Réponse traitée non-HTML de Gemini")
        );

        assert_eq!(EnhancementOutcome::NotAttempted.status(), EnhancementStatus::NotAttempted);
    }

    #[test]
    fn statuses_serialize_to_their_reported_form() {
        assert_eq!(
            serde_json::to_value(EnhancementStatus::Crashed).unwrap(),
            serde_json::json!("échouée (exception)")
        );
        assert_eq!(
            serde_json::to_value(EnhancementStatus::NotAttempted).unwrap(),
            serde_json::json!(EnhancementStatus::NotAttempted.as_str())
        );
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = EnhancerConfig {
            api_key: Some("  ".into()),
            ..Default::default()
        };
        assert!(config.api_key().is_none());
    }
}
