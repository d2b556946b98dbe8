//! Reminder planning on top of the notification scheduler.
//!
//! # Responsibility
//! - Derive the notifications a task needs for one user.
//! - Keep the scheduler in sync when tasks are created, marked or removed.
//!
//! # Invariants
//! - Triggers at or before `now` are never scheduled.
//! - Users who neither own nor joined a task get no notifications for it.
//! - A task is re-synced by cancel-then-schedule, so stale keys never linger.

use crate::config::{ConfigError, PlannerConfig, ReminderConfig, ScheduleConfig};
use crate::identity::UserId;
use crate::model::completion::CompletionState;
use crate::model::task::{Task, TaskId, TaskTime};
use crate::notify::{NotificationCategory, NotificationRequest, NotificationScheduler, NotifyResult};
use crate::schedule::codec::format_time;
use crate::schedule::window::task_window;
use chrono::{NaiveDateTime, NaiveTime};
use log::info;

/// Reminder service bound to one scheduler.
pub struct ReminderService<S: NotificationScheduler> {
    scheduler: S,
    schedule: ScheduleConfig,
    reminders: ReminderConfig,
    unscheduled_time: NaiveTime,
}

impl<S: NotificationScheduler> ReminderService<S> {
    pub fn new(scheduler: S, config: &PlannerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let unscheduled_time = config
            .reminders
            .unscheduled_time()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(Self {
            scheduler,
            schedule: config.schedule,
            reminders: config.reminders.clone(),
            unscheduled_time,
        })
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Notifications `user` should receive for `task` from `now` on.
    pub fn plan(&self, user: &UserId, task: &Task, now: NaiveDateTime) -> Vec<NotificationRequest> {
        let state = task.completion_for(user);
        // Owners of global tasks are reminded of what they publish.
        if state.is_none() && task.owner != *user {
            return Vec::new();
        }

        let mut planned = Vec::new();

        let (reminder_at, body) = match task.time {
            TaskTime::At(at) => (
                task.date.and_time(at) - self.reminders.lead(),
                format!("Starts at {}", format_time(at)),
            ),
            TaskTime::Range { from, to } => (
                task.date.and_time(from) - self.reminders.lead(),
                format!("{}-{}", format_time(from), format_time(to)),
            ),
            TaskTime::Unscheduled => (
                task.date.and_time(self.unscheduled_time),
                "Planned for today".to_string(),
            ),
        };
        if reminder_at > now {
            planned.push(NotificationRequest {
                task_id: task.id,
                category: NotificationCategory::Reminder,
                title: task.name.clone(),
                body,
                trigger_at: reminder_at,
            });
        }

        if self.reminders.completion_prompt && state == Some(CompletionState::Unmarked) {
            let (_, end) = task_window(&task.schedule(), &self.schedule);
            if end > now {
                planned.push(NotificationRequest {
                    task_id: task.id,
                    category: NotificationCategory::CompletionPrompt,
                    title: task.name.clone(),
                    body: format!(
                        "Did you finish it? You can mark it for {} more minutes.",
                        self.schedule.completion_grace_minutes
                    ),
                    trigger_at: end,
                });
            }
        }

        planned
    }

    /// Replaces all pending notifications of `task` with a fresh plan.
    /// Returns the number scheduled.
    pub fn sync_task(&self, user: &UserId, task: &Task, now: NaiveDateTime) -> NotifyResult<usize> {
        self.scheduler.cancel_task(task.id)?;
        let planned = self.plan(user, task, now);
        let count = planned.len();
        for request in planned {
            self.scheduler.schedule(request)?;
        }
        info!(
            "event=reminder_sync module=service status=ok task_id={} scheduled={count}",
            task.id
        );
        Ok(count)
    }

    /// Cancels every pending notification of a task.
    pub fn cancel_task(&self, task_id: TaskId) -> NotifyResult<usize> {
        let cancelled = self.scheduler.cancel_task(task_id)?;
        info!("event=reminder_cancel module=service status=ok task_id={task_id} cancelled={cancelled}");
        Ok(cancelled)
    }
}
