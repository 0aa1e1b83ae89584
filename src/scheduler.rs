//! One-shot scheduling of the audit-end trigger

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{AutoIndexError, Result};

/// Identifier of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleId(u64);

/// Runs a task once after a delay
pub trait Scheduler: Send + Sync {
    /// Schedule `task` to run once after `delay`
    fn schedule_once(&self, delay: Duration, task: BoxFuture<'static, ()>) -> Result<ScheduleId>;

    /// Cancel a scheduled task. Unknown, fired or already cancelled ids are ignored.
    fn cancel(&self, id: ScheduleId);
}

/// Scheduler backed by Tokio tasks.
///
/// A task removes its own entry before it starts running, so cancelling the id
/// of a task that has already fired never aborts it mid-run.
#[derive(Default)]
pub struct TokioScheduler {
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<ScheduleId, JoinHandle<()>>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to fire
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Scheduler for TokioScheduler {
    /// Fails with [`AutoIndexError::SchedulerUnavailable`] outside a Tokio runtime.
    fn schedule_once(&self, delay: Duration, task: BoxFuture<'static, ()>) -> Result<ScheduleId> {
        let runtime =
            Handle::try_current().map_err(|e| AutoIndexError::SchedulerUnavailable(e.to_string()))?;
        let id = ScheduleId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tasks = Arc::clone(&self.tasks);

        // Hold the lock until the handle is stored so the task cannot remove
        // its entry before it exists
        let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tasks.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
            task.await;
        });
        guard.insert(id, handle);

        Ok(id)
    }

    fn cancel(&self, id: ScheduleId) {
        let handle = self.tasks.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
