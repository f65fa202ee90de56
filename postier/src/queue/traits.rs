use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use super::entry::{ExecutionContext, TaskEntry, TaskOpts};
use super::QueueError;

/// Boxed error returned by a failing task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias for the return type of [`Task::perform`].
pub type TaskResult = Result<Option<serde_json::Value>, BoxError>;

/// A serializable unit of work with typed execution logic.
///
/// The task's fields become the JSON payload stored in the queue; `perform`
/// runs on whichever worker claims it.
#[async_trait]
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique identifier for this task type (e.g. `"postier::send_email"`).
    const TASK_TYPE: &'static str;

    /// Shared state provided at execution time.
    type Context: Send + Sync + 'static;

    fn default_opts() -> TaskOpts {
        TaskOpts::default()
    }

    /// Execute the task. `Ok(Some(value))` is stored as the task result;
    /// `Err` marks the task failed (or schedules a retry when attempts remain).
    async fn perform(self, ctx: &Self::Context, exec: ExecutionContext) -> TaskResult;
}

/// Backend-agnostic queue storage and result store.
///
/// The [`Worker`](super::Worker) owns every state transition and calls
/// `update` with the modified entry; providers only persist.
#[async_trait]
pub trait QueueProvider: Send + Sync + Clone + 'static {
    /// Insert a new task entry.
    async fn insert(&self, entry: &TaskEntry) -> Result<(), QueueError>;

    /// Atomically claim the next eligible task.
    ///
    /// The implementation must pick a pending task with `run_at <= now`, set
    /// its status to `Running`, stamp `locked_at`/`locked_by`, increment
    /// `attempts`, and return it. `None` when nothing is eligible.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<TaskEntry>, QueueError>;

    /// Persist an updated entry by id.
    async fn update(&self, entry: &TaskEntry) -> Result<(), QueueError>;

    /// Look a task up by id.
    async fn fetch(&self, id: Uuid) -> Result<Option<TaskEntry>, QueueError>;
}
