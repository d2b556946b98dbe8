//! Notification scheduler boundary.
//!
//! # Responsibility
//! - Define the request shape handed to the host's local-notification SDK.
//! - Provide an in-process scheduler used by tests and headless hosts.
//!
//! # Invariants
//! - At most one pending notification exists per `(task id, category)`;
//!   scheduling an existing key replaces the previous request.

use crate::model::task::TaskId;
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

pub type NotifyResult<T> = Result<T, NotificationError>;

/// Kind of notification attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// Heads-up before the task starts.
    Reminder,
    /// Prompt to mark the task once its window closes.
    CompletionPrompt,
}

impl NotificationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::CompletionPrompt => "completion_prompt",
        }
    }
}

/// One notification to be delivered at `trigger_at` (device local time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub task_id: TaskId,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub trigger_at: NaiveDateTime,
}

impl NotificationRequest {
    pub fn key(&self) -> (TaskId, NotificationCategory) {
        (self.task_id, self.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    InvalidRequest(String),
    /// Host SDK failure, carried as text across the boundary.
    Backend(String),
}

impl Display for NotificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(message) => write!(f, "invalid notification request: {message}"),
            Self::Backend(message) => write!(f, "notification backend failure: {message}"),
        }
    }
}

impl Error for NotificationError {}

/// Host notification scheduler contract.
pub trait NotificationScheduler {
    /// Schedules `request`, replacing any pending one with the same key.
    fn schedule(&self, request: NotificationRequest) -> NotifyResult<()>;
    /// Cancels one pending notification. Returns `false` if none existed.
    fn cancel(&self, task_id: TaskId, category: NotificationCategory) -> NotifyResult<bool>;
    /// Cancels every pending notification of a task. Returns how many.
    fn cancel_task(&self, task_id: TaskId) -> NotifyResult<usize>;
    /// Pending notifications ordered by task id, then category.
    fn pending(&self) -> NotifyResult<Vec<NotificationRequest>>;
}

/// Scheduler that keeps pending notifications in memory.
#[derive(Debug, Default)]
pub struct InMemoryNotificationScheduler {
    entries: Mutex<BTreeMap<(TaskId, NotificationCategory), NotificationRequest>>,
}

impl InMemoryNotificationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<(TaskId, NotificationCategory), NotificationRequest>>
    {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationScheduler for InMemoryNotificationScheduler {
    fn schedule(&self, request: NotificationRequest) -> NotifyResult<()> {
        if request.title.trim().is_empty() {
            return Err(NotificationError::InvalidRequest(
                "title cannot be empty".to_string(),
            ));
        }
        let replaced = self.lock().insert(request.key(), request.clone()).is_some();
        debug!(
            "event=notification_schedule module=notify status=ok task_id={} category={} replaced={replaced}",
            request.task_id,
            request.category.as_str()
        );
        Ok(())
    }

    fn cancel(&self, task_id: TaskId, category: NotificationCategory) -> NotifyResult<bool> {
        Ok(self.lock().remove(&(task_id, category)).is_some())
    }

    fn cancel_task(&self, task_id: TaskId) -> NotifyResult<usize> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(id, _), _| *id != task_id);
        Ok(before - entries.len())
    }

    fn pending(&self) -> NotifyResult<Vec<NotificationRequest>> {
        Ok(self.lock().values().cloned().collect())
    }
}
