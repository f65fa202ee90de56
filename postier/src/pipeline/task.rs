use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use super::body::select_body;
use super::{DeliveryReport, PipelineContext, SendRequest, TaskError};
use crate::enhance::EnhancementOutcome;
use crate::mail::OutgoingMail;
use crate::queue::{panic_message, ExecutionContext, Task, TaskOpts, TaskResult};

/// Orchestrator state; every transition is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Enhancing,
    Sending,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Enhancing => "enhancing",
            Self::Sending => "sending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enhance (optionally) and deliver one email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SendEmailTask(pub SendRequest);

impl SendEmailTask {
    pub fn new(request: SendRequest) -> Self {
        Self(request)
    }
}

#[async_trait]
impl Task for SendEmailTask {
    const TASK_TYPE: &'static str = "postier::send_email";
    type Context = PipelineContext;

    /// Delivery is not retried.
    fn default_opts() -> TaskOpts {
        TaskOpts { max_attempts: 1 }
    }

    async fn perform(self, ctx: &PipelineContext, exec: ExecutionContext) -> TaskResult {
        let report = process(self.0, ctx, exec).await?;
        Ok(Some(serde_json::to_value(report)?))
    }
}

/// Run the whole pipeline for one request.
pub async fn process(
    request: SendRequest,
    ctx: &PipelineContext,
    exec: ExecutionContext,
) -> Result<DeliveryReport, TaskError> {
    let task_id = exec.task_id;
    let recipient = request.recipient.as_str();

    tracing::info!(%task_id, attempt = exec.attempt, recipient, enhance = request.enhance, stage = %Stage::Received, "task received");

    let enhancement = if request.enhance {
        tracing::info!(%task_id, stage = %Stage::Enhancing, "enhancing content");
        AssertUnwindSafe(ctx.enhancer.enhance(&request.raw_message, &request.subject))
            .catch_unwind()
            .await
            .map_err(|panic| panic_message(panic.as_ref()).to_string())
    } else {
        Ok(EnhancementOutcome::NotAttempted)
    };

    let selection = select_body(&request.raw_message, enhancement);
    if let Some(error) = &selection.error {
        tracing::warn!(%task_id, status = %selection.status, %error, "enhancement degraded, sending fallback body");
    }

    tracing::info!(%task_id, stage = %Stage::Sending, kind = ?selection.kind, "sending email");
    let mail = OutgoingMail::new(
        request.recipient.clone(),
        request.subject.clone(),
        selection.body,
        selection.kind,
    );

    let delivered = AssertUnwindSafe(ctx.mailer.send(&mail)).catch_unwind().await;
    let result = match delivered {
        Ok(Ok(())) => Ok(DeliveryReport::success(
            request.recipient.clone(),
            selection.status,
            selection.error,
        )),
        Ok(Err(e)) => Err(TaskError::Delivery(e)),
        Err(panic) => Err(TaskError::DeliveryPanicked(
            panic_message(panic.as_ref()).to_string(),
        )),
    };

    match &result {
        Ok(_) => tracing::info!(%task_id, recipient, stage = %Stage::Succeeded, "email delivered"),
        Err(e) => tracing::error!(%task_id, recipient, stage = %Stage::Failed, error = %e, "email not delivered"),
    }
    result
}
