use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::error::jsend::StatusResponse;
use crate::pipeline::{SendEmailTask, SendRequest};
use crate::queue::{self, QueueProvider, TaskEntry, TaskStatus};

pub const HEALTH_MESSAGE: &str = "Mailing service is running";
pub const QUEUED_MESSAGE: &str = "La demande d'envoi d'email a été mise en file d'attente.";

pub async fn health() -> Json<StatusResponse<'static>> {
    Json(StatusResponse {
        status: "ok",
        message: HEALTH_MESSAGE,
    })
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub task_id: Uuid,
}

pub async fn create_message<Q: QueueProvider>(
    State(state): State<AppState<Q>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<QueuedResponse>), ApiError> {
    if !is_json(&headers) {
        return Err(ApiError::NotJson);
    }
    let value: Value = serde_json::from_slice(&body).map_err(|_| ApiError::NotJson)?;
    let request = parse_request(&value)?;
    let recipient = request.recipient.clone();

    let task_id = queue::enqueue(&state.queue, SendEmailTask::new(request))
        .await
        .map_err(ApiError::Enqueue)?;

    tracing::info!(%task_id, %recipient, "email request queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            status: "queued",
            message: QUEUED_MESSAGE,
            task_id,
        }),
    ))
}

/// Current state of a queued task, and its result once terminal.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub task_id: Uuid,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TaskEntry> for TaskView {
    fn from(entry: TaskEntry) -> Self {
        let error = match entry.status {
            TaskStatus::Failed => entry.last_error,
            _ => None,
        };
        Self {
            task_id: entry.id,
            status: entry.status,
            result: entry.result,
            error,
        }
    }
}

pub async fn get_task<Q: QueueProvider>(
    State(state): State<AppState<Q>>,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::InvalidTaskId)?;
    let entry = state
        .queue
        .fetch(id)
        .await
        .map_err(ApiError::Lookup)?
        .ok_or(ApiError::TaskNotFound)?;
    Ok(Json(TaskView::from(entry)))
}

/// `application/json` or any `application/*+json` media type.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json"
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

/// Required fields must be non-empty strings; `enhance_content` only counts
/// when it is a boolean.
fn parse_request(value: &Value) -> Result<SendRequest, ApiError> {
    fn text<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
        value.get(name)?.as_str().filter(|s| !s.is_empty())
    }

    let recipient = text(value, "destinataire");
    let subject = text(value, "sujet");
    let message = text(value, "message");

    match (recipient, subject, message) {
        (Some(recipient), Some(subject), Some(message)) => {
            let enhance = value
                .get("enhance_content")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(SendRequest::new(recipient, subject, message, enhance))
        }
        _ => {
            let missing = [
                ("destinataire", recipient),
                ("sujet", subject),
                ("message", message),
            ]
            .into_iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| name)
            .collect();
            Err(ApiError::MissingFields(missing))
        }
    }
}
