use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::entry::{TaskEntry, TaskStatus};
use super::registry::TaskRegistry;
use super::traits::{QueueProvider, TaskResult};

/// Worker pool settings (`WORKER_CONCURRENCY`, `WORKER_POLL_INTERVAL_MS`).
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: default_concurrency(),
            worker_poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Polls a [`QueueProvider`] and dispatches claimed tasks to the handlers in
/// a [`TaskRegistry`].
///
/// The worker owns every state transition: success marks the entry
/// succeeded with its result, failure either schedules a retry (only when
/// the task type allows more than one attempt) or marks it failed with the
/// error text. A panicking task is recorded as a failure rather than leaving
/// the entry stuck in `running`.
///
/// ```ignore
/// let registry = TaskRegistry::new().register::<SendEmailTask>();
///
/// let worker = Worker::new(queue, registry, pipeline_context)
///     .concurrency(8)
///     .poll_interval(Duration::from_millis(500))
///     .start();
///
/// shutdown_signal().await;
/// worker.shutdown().await;
/// ```
pub struct Worker<Q: QueueProvider, S: Send + Sync + 'static> {
    queue: Q,
    registry: Arc<TaskRegistry<S>>,
    ctx: Arc<S>,
    concurrency: usize,
    poll_interval: Duration,
    worker_id: String,
}

impl<Q: QueueProvider, S: Send + Sync + 'static> Worker<Q, S> {
    pub fn new(queue: Q, registry: TaskRegistry<S>, ctx: S) -> Self {
        Self::with_shared_context(queue, registry, Arc::new(ctx))
    }

    pub fn with_shared_context(queue: Q, registry: TaskRegistry<S>, ctx: Arc<S>) -> Self {
        Self {
            queue,
            registry: Arc::new(registry),
            ctx,
            concurrency: default_concurrency(),
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            worker_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Apply pool settings loaded from the environment.
    pub fn configure(self, config: &WorkerConfig) -> Self {
        self.concurrency(config.worker_concurrency)
            .poll_interval(Duration::from_millis(config.worker_poll_interval_ms))
    }

    /// Maximum number of tasks processed in parallel (default: 4).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// How often to poll when idle (default: 1s). Backs off slightly during
    /// idle streaks.
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Start the worker loop on a background tokio task.
    ///
    /// Dropping the returned handle also stops the loop from claiming.
    pub fn start(self) -> WorkerHandle {
        let Worker {
            queue,
            registry,
            ctx,
            concurrency,
            poll_interval,
            worker_id,
        } = self;

        tracing::info!(%worker_id, concurrency, "worker running");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(concurrency));
            let mut idle_streak: u32 = 0;

            while !stopping(&shutdown_rx) {
                let permit = tokio::select! {
                    _ = shutdown_rx.changed() => continue,
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                // Not raced against shutdown: a claim cut short could leave
                // a row marked running with nobody working on it.
                let entry = match queue.claim_next(&worker_id).await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => {
                        drop(permit);
                        idle_streak = idle_streak.saturating_add(1);
                        let backoff =
                            poll_interval.mul_f64((1.5_f64).min(1.0 + idle_streak as f64 * 0.1));
                        pause(&mut shutdown_rx, backoff).await;
                        continue;
                    }
                    Err(e) => {
                        drop(permit);
                        tracing::error!(error = %e, "failed to poll queue");
                        pause(&mut shutdown_rx, poll_interval).await;
                        continue;
                    }
                };

                idle_streak = 0;

                let queue = queue.clone();
                let registry = registry.clone();
                let ctx = ctx.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    run_entry(queue, registry, ctx, entry).await;
                });
            }

            tracing::info!(%worker_id, "worker draining in-flight tasks");
            // Every permit back means every spawned task has settled.
            let _drained = semaphore.acquire_many(concurrency as u32).await;
            tracing::info!(%worker_id, "worker stopped");
        });

        WorkerHandle { shutdown_tx, join }
    }
}

/// Handle to a started [`Worker`].
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stop claiming new tasks and wait until the ones already claimed have
    /// been run and recorded.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "worker loop ended abnormally");
        }
    }

    /// Stop the polling loop immediately. Claimed tasks keep running on the
    /// runtime but nothing waits for them.
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// The handle asked for shutdown, or was dropped.
fn stopping(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Sleep for `d`, waking early on shutdown.
async fn pause(shutdown: &mut watch::Receiver<bool>, d: Duration) {
    tokio::select! {
        _ = shutdown.changed() => {}
        _ = tokio::time::sleep(d) => {}
    }
}

async fn run_entry<Q, S>(queue: Q, registry: Arc<TaskRegistry<S>>, ctx: Arc<S>, mut entry: TaskEntry)
where
    Q: QueueProvider,
    S: Send + Sync + 'static,
{
    let task_id = entry.id;
    let task_type = entry.task_type.clone();

    let Some(handler) = registry.get(&task_type).cloned() else {
        tracing::error!(%task_id, %task_type, "no handler registered");
        entry.status = TaskStatus::Failed;
        entry.last_error = Some("unknown task type".to_string());
        entry.completed_at = Some(OffsetDateTime::now_utc());
        persist(&queue, &entry).await;
        return;
    };

    let span = tracing::info_span!("task", %task_id, %task_type, attempt = entry.attempts);
    let run = handler(entry.payload.clone(), ctx, entry.execution());
    let result: TaskResult = match AssertUnwindSafe(run).catch_unwind().instrument(span).await {
        Ok(result) => result,
        Err(panic) => Err(format!("task panicked: {}", panic_message(panic.as_ref())).into()),
    };

    settle(&mut entry, result);
    persist(&queue, &entry).await;
}

/// Apply the outcome of one attempt to the entry.
pub(crate) fn settle(entry: &mut TaskEntry, result: TaskResult) {
    let task_id = entry.id;
    let task_type = entry.task_type.clone();

    match result {
        Ok(task_result) => {
            tracing::info!(%task_id, %task_type, "task succeeded");
            entry.status = TaskStatus::Succeeded;
            entry.result = task_result;
            entry.last_error = None;
            entry.completed_at = Some(OffsetDateTime::now_utc());
        }
        Err(e) => {
            let error_msg = e.to_string();
            entry.last_error = Some(error_msg.clone());
            entry.locked_at = None;
            entry.locked_by = None;

            if entry.attempts < entry.max_attempts {
                let backoff_secs = 2_u64.saturating_pow(entry.attempts.max(0) as u32).min(300);
                entry.status = TaskStatus::Pending;
                entry.run_at = OffsetDateTime::now_utc() + Duration::from_secs(backoff_secs);
                tracing::warn!(
                    %task_id, %task_type,
                    attempt = entry.attempts,
                    %error_msg,
                    backoff_secs,
                    "task failed, scheduling retry"
                );
            } else {
                entry.status = TaskStatus::Failed;
                entry.completed_at = Some(OffsetDateTime::now_utc());
                tracing::error!(
                    %task_id, %task_type,
                    attempts = entry.attempts,
                    %error_msg,
                    "task failed"
                );
            }
        }
    }
}

async fn persist<Q: QueueProvider>(queue: &Q, entry: &TaskEntry) {
    if let Err(e) = queue.update(entry).await {
        tracing::error!(task_id = %entry.id, error = %e, "failed to record task outcome");
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TaskOpts;

    fn running(max_attempts: i32) -> TaskEntry {
        let mut entry = TaskEntry::new(
            "demo",
            serde_json::json!({}),
            &TaskOpts { max_attempts },
        );
        entry.status = TaskStatus::Running;
        entry.attempts = 1;
        entry.locked_by = Some("w".into());
        entry
    }

    #[test]
    fn success_stores_the_result() {
        let mut entry = running(1);
        settle(&mut entry, Ok(Some(serde_json::json!({"status": "success"}))));
        assert_eq!(entry.status, TaskStatus::Succeeded);
        assert_eq!(entry.result, Some(serde_json::json!({"status": "success"})));
        assert!(entry.completed_at.is_some());
    }

    #[test]
    fn failure_without_attempts_left_is_terminal() {
        let mut entry = running(1);
        settle(&mut entry, Err("delivery failed".into()));
        assert_eq!(entry.status, TaskStatus::Failed);
        assert_eq!(entry.last_error.as_deref(), Some("delivery failed"));
        assert!(entry.result.is_none());
    }

    #[test]
    fn failure_with_attempts_left_is_rescheduled() {
        let mut entry = running(3);
        settle(&mut entry, Err("flaky".into()));
        assert_eq!(entry.status, TaskStatus::Pending);
        assert!(entry.run_at > OffsetDateTime::now_utc());
        assert!(entry.locked_by.is_none());
        assert!(entry.completed_at.is_none());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
