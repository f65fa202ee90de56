//! HTTP intake surface.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /` | Health check |
//! | `POST /message` | Validate and queue a send request (202) |
//! | `GET /tasks/:id` | Task status and result |

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{QueuedResponse, TaskView, HEALTH_MESSAGE, QUEUED_MESSAGE};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::queue::QueueProvider;

#[derive(Clone)]
pub struct AppState<Q: QueueProvider> {
    pub queue: Q,
}

pub fn router<Q: QueueProvider>(queue: Q) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/message", post(handlers::create_message::<Q>))
        .route("/tasks/:id", get(handlers::get_task::<Q>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { queue })
}
