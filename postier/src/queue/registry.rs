use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::entry::ExecutionContext;
use super::traits::{Task, TaskResult};

type HandlerFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

type HandlerFn<S> = dyn Fn(serde_json::Value, Arc<S>, ExecutionContext) -> HandlerFuture + Send + Sync;

pub(crate) type BoxedHandler<S> = Arc<HandlerFn<S>>;

/// Maps task type strings to deserialization + execution logic.
///
/// Register each [`Task`] type before handing the registry to a
/// [`Worker`](super::Worker).
pub struct TaskRegistry<S: Send + Sync + 'static> {
    handlers: HashMap<&'static str, BoxedHandler<S>>,
}

impl<S: Send + Sync + 'static> TaskRegistry<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<T: Task<Context = S>>(mut self) -> Self {
        let handler: BoxedHandler<S> = Arc::new(
            move |payload: serde_json::Value, ctx: Arc<S>, exec: ExecutionContext| -> HandlerFuture {
                Box::pin(async move {
                    let task: T = serde_json::from_value(payload)?;
                    task.perform(&ctx, exec).await
                })
            },
        );
        self.handlers.insert(T::TASK_TYPE, handler);
        self
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    pub(crate) fn get(&self, task_type: &str) -> Option<&BoxedHandler<S>> {
        self.handlers.get(task_type)
    }
}

impl<S: Send + Sync + 'static> Default for TaskRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
