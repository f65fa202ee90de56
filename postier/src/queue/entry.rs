use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Queue-level status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Options controlling retries for a task.
#[derive(Debug, Clone)]
pub struct TaskOpts {
    /// Maximum number of attempts (including the first).
    pub max_attempts: i32,
}

impl Default for TaskOpts {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

/// Serialized representation of a queued task.
///
/// The same record doubles as the result store: the worker writes the
/// terminal `status`, `result` and `last_error` back onto it, and callers read
/// them by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: Uuid,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: OffsetDateTime,
    pub locked_at: Option<OffsetDateTime>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

impl TaskEntry {
    pub(crate) fn new(task_type: &str, payload: serde_json::Value, opts: &TaskOpts) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.to_string(),
            payload,
            status: TaskStatus::Pending,
            attempts: 0,
            max_attempts: opts.max_attempts,
            run_at: now,
            locked_at: None,
            locked_by: None,
            last_error: None,
            result: None,
            created_at: now,
            completed_at: None,
        }
    }

    /// Execution context handed to the task for the current claim.
    pub fn execution(&self) -> ExecutionContext {
        ExecutionContext {
            task_id: self.id,
            attempt: self.attempts,
        }
    }
}

/// Identity of the running task, passed explicitly into [`Task::perform`].
///
/// [`Task::perform`]: super::Task::perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub task_id: Uuid,
    pub attempt: i32,
}
