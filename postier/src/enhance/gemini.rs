//! Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::journal::Journal;
use super::{markup, prompt, EnhanceError, EnhancementOutcome, Enhancer, EnhancerConfig};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiEnhancer {
    client: Client,
    config: EnhancerConfig,
    journal: Journal,
}

impl GeminiEnhancer {
    pub fn new(config: EnhancerConfig) -> Self {
        if config.api_key().is_none() {
            tracing::warn!("GEMINI_API_KEY is not set, enhancement requests will fail");
        }
        Self {
            client: Client::new(),
            journal: Journal::new(config.log_dir.clone()),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send the prompt; returns the HTTP status and response body.
    async fn request(
        &self,
        api_key: &str,
        prompt: &str,
    ) -> Result<(reqwest::StatusCode, String), EnhanceError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnhanceError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EnhanceError::Transport(e.to_string()))?;
        Ok((status, text))
    }
}

#[async_trait]
impl Enhancer for GeminiEnhancer {
    async fn enhance(&self, raw: &str, subject: &str) -> EnhancementOutcome {
        let Some(api_key) = self.config.api_key() else {
            return EnhancementOutcome::failed(EnhanceError::MissingApiKey);
        };
        if raw.is_empty() {
            return EnhancementOutcome::failed(EnhanceError::EmptyMessage);
        }

        let prompt = prompt::build(raw, subject);
        tracing::info!(model = %self.config.model, "requesting enhancement");

        let (status, payload) = match self.request(api_key, &prompt).await {
            Ok(response) => response,
            Err(reason) => {
                tracing::warn!(error = %reason, "enhancement request failed");
                self.journal.record(&prompt, "", "").await;
                return EnhancementOutcome::failed(reason);
            }
        };

        let candidate = if status.is_success() {
            candidate_text(&payload)
        } else {
            Err(EnhanceError::Upstream {
                status: status.as_u16(),
                body: payload.clone(),
            })
        };

        let outcome = match candidate {
            Err(reason) => {
                self.journal.record(&prompt, &payload, "").await;
                EnhancementOutcome::failed(reason)
            }
            Ok(text) => {
                let processed = markup::strip_code_fences(&text);
                self.journal.record(&prompt, &text, processed).await;
                if markup::looks_like_markup(processed) {
                    EnhancementOutcome::Succeeded {
                        body: processed.to_string(),
                    }
                } else {
                    EnhancementOutcome::FailedWithFallback {
                        body: markup::fallback_body(raw),
                        reason: EnhanceError::NotMarkup,
                    }
                }
            }
        };

        match outcome.error() {
            None => tracing::info!("enhancement succeeded"),
            Some(reason) => tracing::warn!(error = %reason, "enhancement failed"),
        }
        outcome
    }
}

/// Extract the first candidate's text, or the reason there is none.
fn candidate_text(payload: &str) -> Result<String, EnhanceError> {
    let parsed: GenerateResponse =
        serde_json::from_str(payload).map_err(|e| EnhanceError::Malformed(e.to_string()))?;

    if let Some(text) = parsed.text() {
        return Ok(text);
    }

    let prompt_block = parsed.prompt_feedback.and_then(|f| f.block_reason);
    let candidate_block = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.finish_reason)
        .filter(|reason| reason != FINISH_STOP);
    match prompt_block.or(candidate_block) {
        Some(reason) => Err(EnhanceError::Blocked(reason)),
        None => Err(EnhanceError::EmptyResponse),
    }
}

/// Finish reason of a candidate that ended normally.
const FINISH_STOP: &str = "STOP";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!parts.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
