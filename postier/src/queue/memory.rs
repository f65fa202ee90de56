use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::entry::{TaskEntry, TaskStatus};
use super::traits::QueueProvider;
use super::QueueError;

/// In-memory [`QueueProvider`] for development and testing.
///
/// Not durable: every task is lost on restart, and only workers in the same
/// process can see the queue.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    entries: Arc<Mutex<Vec<TaskEntry>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored entry, in insertion order.
    pub async fn entries(&self) -> Vec<TaskEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl QueueProvider for MemoryQueue {
    async fn insert(&self, entry: &TaskEntry) -> Result<(), QueueError> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<TaskEntry>, QueueError> {
        let mut entries = self.entries.lock().await;
        let now = OffsetDateTime::now_utc();

        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.status == TaskStatus::Pending && e.run_at <= now)
        else {
            return Ok(None);
        };

        entry.status = TaskStatus::Running;
        entry.locked_at = Some(now);
        entry.locked_by = Some(worker_id.to_string());
        entry.attempts += 1;
        Ok(Some(entry.clone()))
    }

    async fn update(&self, entry: &TaskEntry) -> Result<(), QueueError> {
        let mut entries = self.entries.lock().await;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(QueueError::NotFound(entry.id)),
        }
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<TaskEntry>, QueueError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }
}
