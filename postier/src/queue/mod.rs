//! Durable task queue with pluggable backends.
//!
//! # Architecture
//!
//! - [`Task`]: serializable payload plus behaviour (`perform`).
//! - [`TaskEntry`]: the stored representation of a task. It is also the
//!   result record: terminal status, result and error are written onto it.
//! - [`QueueProvider`]: backend-agnostic storage trait.
//! - [`PgQueue`]: Postgres provider shared by the intake and worker processes.
//! - [`MemoryQueue`]: in-process provider for development and testing.
//! - [`TaskRegistry`]: maps task type strings to deserialization + execution.
//! - [`Worker`]: polls a provider and drives each claimed task to a terminal state.
//!
//! ```ignore
//! let id = enqueue(&queue, SendEmailTask::new(request)).await?;
//!
//! let registry = TaskRegistry::new().register::<SendEmailTask>();
//! Worker::new(queue.clone(), registry, pipeline_context).start();
//!
//! let entry = queue.fetch(id).await?;
//! ```

mod entry;
mod memory;
mod postgres;
mod registry;
mod traits;
mod worker;

pub use entry::{ExecutionContext, TaskEntry, TaskOpts, TaskStatus};
pub use memory::MemoryQueue;
pub use postgres::{PgQueue, QueueConfig, ABANDONED_ERROR};
pub use registry::TaskRegistry;
pub use traits::{BoxError, QueueProvider, Task, TaskResult};
pub use worker::{Worker, WorkerConfig, WorkerHandle};

pub(crate) use worker::panic_message;

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task {0} not found")]
    NotFound(Uuid),
    #[error("corrupt task row: {0}")]
    Corrupt(String),
    #[error("{0}")]
    Other(String),
}

/// Serialize a task and insert it into the queue with the task type's
/// default options; returns the assigned id.
pub async fn enqueue<T: Task>(queue: &impl QueueProvider, task: T) -> Result<Uuid, QueueError> {
    let entry = TaskEntry::new(T::TASK_TYPE, serde_json::to_value(&task)?, &T::default_opts());
    let id = entry.id;
    queue.insert(&entry).await?;
    tracing::debug!(task_id = %id, task_type = T::TASK_TYPE, "task enqueued");
    Ok(id)
}
