//! Durable [`QueueProvider`] backed by Postgres.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS postier_tasks (
//!     id UUID PRIMARY KEY,
//!     task_type TEXT NOT NULL,
//!     payload JSONB NOT NULL,
//!     status TEXT NOT NULL,
//!     attempts INT4 NOT NULL DEFAULT 0,
//!     max_attempts INT4 NOT NULL,
//!     run_at TIMESTAMPTZ NOT NULL,
//!     locked_at TIMESTAMPTZ,
//!     locked_by TEXT,
//!     last_error TEXT,
//!     result JSONB,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     completed_at TIMESTAMPTZ
//! );
//! ```
//!
//! Claims use `SELECT ... FOR UPDATE SKIP LOCKED` so any number of worker
//! processes can share the table. A `running` row whose lock is older than
//! the configured lock timeout is assumed to belong to a crashed worker. It
//! is claimed again only while it has attempts left; otherwise it is marked
//! failed, so no task runs more than `max_attempts` times.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use super::entry::{TaskEntry, TaskStatus};
use super::traits::QueueProvider;
use super::QueueError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS postier_tasks (
    id UUID PRIMARY KEY,
    task_type TEXT NOT NULL,
    payload JSONB NOT NULL,
    status TEXT NOT NULL,
    attempts INT4 NOT NULL DEFAULT 0,
    max_attempts INT4 NOT NULL,
    run_at TIMESTAMPTZ NOT NULL,
    locked_at TIMESTAMPTZ,
    locked_by TEXT,
    last_error TEXT,
    result JSONB,
    created_at TIMESTAMPTZ NOT NULL,
    completed_at TIMESTAMPTZ
)
"#;

/// `last_error` of a task whose worker disappeared on its final attempt.
pub const ABANDONED_ERROR: &str = "worker stopped before the task finished";

const FAIL_ABANDONED: &str = r#"
UPDATE postier_tasks
SET status = 'failed', locked_at = NULL, locked_by = NULL, last_error = $2,
    completed_at = NOW()
WHERE status = 'running'
  AND locked_at < NOW() - make_interval(secs => $1)
  AND attempts >= max_attempts
"#;

const CREATE_CLAIM_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS postier_tasks_claim_idx ON postier_tasks (status, run_at)";

/// Broker settings (`QUEUE_URL`, `QUEUE_MAX_CONNECTIONS`, `QUEUE_LOCK_TIMEOUT`).
///
/// Task rows double as the result store, so a single connection URL covers
/// both the broker and result retrieval.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_url")]
    pub queue_url: String,
    #[serde(default = "default_max_connections")]
    pub queue_max_connections: u32,
    /// Seconds after which a `running` task is considered abandoned.
    #[serde(default = "default_lock_timeout")]
    pub queue_lock_timeout: u64,
}

fn default_queue_url() -> String {
    "postgres://localhost/postier".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_lock_timeout() -> u64 {
    300
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_url: default_queue_url(),
            queue_max_connections: default_max_connections(),
            queue_lock_timeout: default_lock_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgQueue {
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.queue_max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.queue_url)
            .await?;
        Ok(Self::from_pool(pool, Duration::from_secs(config.queue_lock_timeout)))
    }

    pub fn from_pool(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Create the task table and its claim index if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), QueueError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_CLAIM_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl QueueProvider for PgQueue {
    async fn insert(&self, entry: &TaskEntry) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            INSERT INTO postier_tasks (
                id, task_type, payload, status, attempts, max_attempts,
                run_at, locked_at, locked_by, last_error, result,
                created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.task_type)
        .bind(&entry.payload)
        .bind(entry.status.as_str())
        .bind(entry.attempts)
        .bind(entry.max_attempts)
        .bind(entry.run_at)
        .bind(entry.locked_at)
        .bind(&entry.locked_by)
        .bind(&entry.last_error)
        .bind(&entry.result)
        .bind(entry.created_at)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<TaskEntry>, QueueError> {
        let abandoned = sqlx::query(FAIL_ABANDONED)
            .bind(self.lock_timeout.as_secs_f64())
            .bind(ABANDONED_ERROR)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if abandoned > 0 {
            tracing::warn!(count = abandoned, "abandoned tasks with no attempts left marked failed");
        }

        let row = sqlx::query(
            r#"
            UPDATE postier_tasks
            SET status = 'running', locked_at = NOW(), locked_by = $1, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM postier_tasks
                WHERE (status = 'pending' AND run_at <= NOW())
                   OR (status = 'running' AND attempts < max_attempts
                       AND locked_at < NOW() - make_interval(secs => $2))
                ORDER BY run_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(self.lock_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| entry_from_row(&row)).transpose()
    }

    async fn update(&self, entry: &TaskEntry) -> Result<(), QueueError> {
        let updated = sqlx::query(
            r#"
            UPDATE postier_tasks
            SET status = $2, attempts = $3, run_at = $4, locked_at = $5, locked_by = $6,
                last_error = $7, result = $8, completed_at = $9
            WHERE id = $1
            "#,
        )
        .bind(entry.id)
        .bind(entry.status.as_str())
        .bind(entry.attempts)
        .bind(entry.run_at)
        .bind(entry.locked_at)
        .bind(&entry.locked_by)
        .bind(&entry.last_error)
        .bind(&entry.result)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(QueueError::NotFound(entry.id));
        }
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<TaskEntry>, QueueError> {
        let row = sqlx::query("SELECT * FROM postier_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| entry_from_row(&row)).transpose()
    }
}

fn entry_from_row(row: &PgRow) -> Result<TaskEntry, QueueError> {
    let status: String = row.try_get("status")?;
    Ok(TaskEntry {
        id: row.try_get("id")?,
        task_type: row.try_get("task_type")?,
        payload: row.try_get("payload")?,
        status: TaskStatus::try_from(status).map_err(QueueError::Corrupt)?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        run_at: row.try_get("run_at")?,
        locked_at: row.try_get("locked_at")?,
        locked_by: row.try_get("locked_by")?,
        last_error: row.try_get("last_error")?,
        result: row.try_get("result")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}
