use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::jsend::ErrorResponse;
use crate::queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request must be JSON")]
    NotJson,

    #[error("Champs manquants: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Échec de la mise en file d'attente de la tâche.")]
    Enqueue(#[source] QueueError),

    #[error("Identifiant de tâche invalide.")]
    InvalidTaskId,

    #[error("Tâche introuvable.")]
    TaskNotFound,

    #[error("Échec de la lecture de la tâche.")]
    Lookup(#[source] QueueError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotJson | Self::MissingFields(_) | Self::InvalidTaskId => StatusCode::BAD_REQUEST,
            Self::TaskNotFound => StatusCode::NOT_FOUND,
            Self::Enqueue(_) | Self::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Enqueue(source) | Self::Lookup(source) => {
                tracing::error!(error = %source, "{}", self);
                ErrorResponse::new(self.to_string()).with_details(source.to_string())
            }
            _ => {
                tracing::debug!(%status, "{}", self);
                ErrorResponse::new(self.to_string())
            }
        };
        (status, Json(body)).into_response()
    }
}
