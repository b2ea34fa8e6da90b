//! Asynchronous task hand-off behind opaque handles

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

use super::Outcome;
use crate::error::{Error, ErrorCode, Result};

/// Opaque id of a submitted task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Ready,
}

/// Work handed to a backend
pub type TaskFuture = BoxFuture<'static, Result<Outcome>>;

/// Runs submitted work and keeps its result until collected
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn submit(&self, task: TaskFuture) -> Result<TaskHandle>;

    /// Check completion without waiting
    async fn poll(&self, handle: &TaskHandle) -> Result<TaskStatus>;

    /// Wait for the task and return its outcome.
    ///
    /// Collecting the same handle again returns the same result.
    async fn collect(&self, handle: &TaskHandle) -> Result<Outcome>;

    /// Drop the task and its result; a running task is aborted.
    ///
    /// Forgetting an unknown handle does nothing.
    async fn forget(&self, handle: &TaskHandle) -> Result<()>;
}

#[derive(Debug, Clone)]
struct TaskFailure {
    code: u16,
    message: String,
}

impl TaskFailure {
    fn into_error(self) -> Error {
        Error::processor_with_code(self.code, self.message)
    }
}

enum Slot {
    Running(JoinHandle<Result<Outcome>>),
    Finished(std::result::Result<Outcome, TaskFailure>),
}

/// [`TaskBackend`] spawning each task on the tokio runtime
#[derive(Default, Clone)]
pub struct TokioTaskBackend {
    slots: Arc<Mutex<HashMap<TaskHandle, Arc<Mutex<Slot>>>>>,
}

impl TokioTaskBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks whose results are still held
    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.len()
    }

    async fn slot(&self, handle: &TaskHandle) -> Result<Arc<Mutex<Slot>>> {
        self.slots.lock().await.get(handle).cloned().ok_or_else(|| {
            Error::processor_with_code(
                ErrorCode::PROCESSOR_UNKNOWN_HANDLE,
                format!("No task with handle {}", handle),
            )
        })
    }

    fn settle(
        handle: &TaskHandle,
        joined: std::result::Result<Result<Outcome>, JoinError>,
    ) -> std::result::Result<Outcome, TaskFailure> {
        match joined {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                warn!(task = %handle, "Task failed: {}", e);
                Err(TaskFailure {
                    code: ErrorCode::PROCESSOR_TASK_FAILED,
                    message: format!("Task {} failed: {}", handle, e),
                })
            }
            Err(e) => {
                warn!(task = %handle, "Task panicked or was cancelled: {}", e);
                Err(TaskFailure {
                    code: ErrorCode::PROCESSOR_TASK_PANICKED,
                    message: format!("Task {} did not run to completion: {}", handle, e),
                })
            }
        }
    }
}

#[async_trait]
impl TaskBackend for TokioTaskBackend {
    async fn submit(&self, task: TaskFuture) -> Result<TaskHandle> {
        let handle = TaskHandle::generate();
        let join = tokio::spawn(task);
        self.slots
            .lock()
            .await
            .insert(handle.clone(), Arc::new(Mutex::new(Slot::Running(join))));
        debug!(task = %handle, "Submitted task");
        Ok(handle)
    }

    async fn poll(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        let slot = self.slot(handle).await?;
        // A slot held by a collector is still being waited on
        let Ok(slot) = slot.try_lock() else {
            return Ok(TaskStatus::Pending);
        };
        Ok(match &*slot {
            Slot::Running(join) if !join.is_finished() => TaskStatus::Pending,
            _ => TaskStatus::Ready,
        })
    }

    async fn collect(&self, handle: &TaskHandle) -> Result<Outcome> {
        let slot = self.slot(handle).await?;
        let mut slot = slot.lock().await;

        let result = match &mut *slot {
            Slot::Finished(result) => result.clone(),
            Slot::Running(join) => {
                let result = Self::settle(handle, join.await);
                *slot = Slot::Finished(result.clone());
                result
            }
        };
        result.map_err(TaskFailure::into_error)
    }

    async fn forget(&self, handle: &TaskHandle) -> Result<()> {
        let Some(slot) = self.slots.lock().await.remove(handle) else {
            return Ok(());
        };
        // A collector holding the slot finishes with the result it awaits
        if let Ok(slot) = slot.try_lock() {
            if let Slot::Running(join) = &*slot {
                join.abort();
            }
        }
        debug!(task = %handle, "Forgot task");
        Ok(())
    }
}
