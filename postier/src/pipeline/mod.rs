//! The send-email task: optional enhancement, body selection, delivery.
//!
//! ```text
//! Received ─► Enhancing? ─► Sending ─► Succeeded
//!                                 └──► Failed
//! ```
//!
//! Enhancement problems never fail the task; they only change which body is
//! sent and how enhancement is reported. Delivery problems always fail it.

mod body;
mod task;

pub use body::{select_body, BodySelection};
pub use task::{process, SendEmailTask, Stage};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::enhance::{EnhancementStatus, Enhancer};
use crate::mail::{DeliveryError, Mailer};

/// A validated send request, stored as the task payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub recipient: String,
    pub subject: String,
    pub raw_message: String,
    #[serde(default)]
    pub enhance: bool,
}

impl SendRequest {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        raw_message: impl Into<String>,
        enhance: bool,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            raw_message: raw_message.into(),
            enhance,
        }
    }
}

/// Gateways shared read-only by every running task.
#[derive(Clone)]
pub struct PipelineContext {
    pub mailer: Arc<dyn Mailer>,
    pub enhancer: Arc<dyn Enhancer>,
}

impl PipelineContext {
    pub fn new(mailer: impl Mailer, enhancer: impl Enhancer) -> Self {
        Self {
            mailer: Arc::new(mailer),
            enhancer: Arc::new(enhancer),
        }
    }
}

/// Result stored on a successfully delivered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub status: String,
    pub recipient: String,
    pub enhancement_status: EnhancementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement_error: Option<String>,
}

impl DeliveryReport {
    pub fn success(
        recipient: String,
        enhancement_status: EnhancementStatus,
        enhancement_error: Option<String>,
    ) -> Self {
        Self {
            status: "success".to_string(),
            recipient,
            enhancement_status,
            enhancement_error,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("SMTP Error: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("SMTP Exception: {0}")]
    DeliveryPanicked(String),
}
