use crate::enhance::{EnhancementOutcome, EnhancementStatus};
use crate::mail::ContentKind;

/// What will actually be sent, and how enhancement is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySelection {
    pub body: String,
    pub kind: ContentKind,
    pub status: EnhancementStatus,
    pub error: Option<String>,
}

/// Pick the body to deliver.
///
/// `enhancement` is the enhancer's outcome, or the panic message when the
/// enhancer crashed. Anything other than a usable HTML body degrades to the
/// raw message as plain text; the fallback wrapper is still sent styled.
pub fn select_body(raw: &str, enhancement: Result<EnhancementOutcome, String>) -> BodySelection {
    let outcome = match enhancement {
        Ok(outcome) => outcome,
        Err(panic) => {
            return BodySelection {
                body: raw.to_string(),
                kind: ContentKind::Plain,
                status: EnhancementStatus::Crashed,
                error: Some(format!("Exception lors de l'appel Gemini: {panic}")),
            }
        }
    };

    let status = outcome.status();
    let error = outcome.error().map(ToString::to_string);
    let (body, kind) = match outcome {
        EnhancementOutcome::Succeeded { body } | EnhancementOutcome::FailedWithFallback { body, .. } => {
            (body, ContentKind::Styled)
        }
        EnhancementOutcome::NotAttempted | EnhancementOutcome::Failed { .. } => {
            (raw.to_string(), ContentKind::Plain)
        }
    };

    BodySelection {
        body,
        kind,
        status,
        error,
    }
}
