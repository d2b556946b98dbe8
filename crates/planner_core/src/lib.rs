//! Core domain logic for the student planner.
//! This crate is the single source of truth for scheduling and completion
//! rules; UI layers call it through `planner_ffi`.

pub mod config;
pub mod db;
pub mod feed;
pub mod identity;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod schedule;
pub mod service;

pub use config::{ConfigError, PlannerConfig, ReminderConfig, ScheduleConfig};
pub use feed::{Subscription, TaskFeed, TaskSnapshot};
pub use identity::{AuthProvider, CurrentUser, StaticAuthProvider, UserId};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
    LoggingStatus,
};
pub use model::completion::{CompletionAction, CompletionError, CompletionMark, CompletionState};
pub use model::task::{Task, TaskId, TaskTime, TaskValidationError, TaskVisibility};
pub use notify::{
    InMemoryNotificationScheduler, NotificationCategory, NotificationRequest,
    NotificationScheduler,
};
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskRepository, TaskFilter, TaskRepository};
pub use schedule::codec::{format_date, parse_date, parse_time, FormatError};
pub use schedule::recurrence::{expand_recurrence, RecurrenceError, RecurrenceMode};
pub use schedule::window::{can_mark_completed, is_active, MarkBlockReason, MarkVerdict, TaskSchedule};
pub use service::reminder_service::ReminderService;
pub use service::task_service::{
    CompletionSummary, NewTaskRequest, ServiceError, ServiceResult, TaskService, WindowStatus,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
