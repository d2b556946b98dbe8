//! Runtime configuration for the planner core.
//!
//! # Responsibility
//! - Hold the tunable constants of the schedule and reminder logic.
//! - Load overrides from JSON supplied by the host app.
//!
//! # Invariants
//! - Every field has a default, so `{}` is a complete configuration.
//! - `validate()` runs on every load path; invalid values never reach services.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::schedule::codec::{parse_time_of_day, FormatError};

/// Default length of the "active" window for single-time tasks.
pub const DEFAULT_ACTIVE_WINDOW_MINUTES: u32 = 60;
/// Default grace period after a task's window during which marking is allowed.
pub const DEFAULT_COMPLETION_GRACE_MINUTES: u32 = 30;
/// Default reminder lead time before a timed task starts.
pub const DEFAULT_REMINDER_LEAD_MINUTES: u32 = 15;
/// Default reminder time of day for tasks without a time.
pub const DEFAULT_UNSCHEDULED_REMINDER_TIME: &str = "09:00";

/// Configuration load/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid planner config: {err}"),
            Self::Invalid(message) => write!(f, "invalid planner config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Top-level planner configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    pub schedule: ScheduleConfig,
    pub reminders: ReminderConfig,
    /// Optional log level override (`trace|debug|info|warn|error`).
    pub log_level: Option<String>,
}

impl PlannerConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule.validate()?;
        self.reminders.validate()?;
        Ok(())
    }
}

/// Window constants used by the activity and completion calculators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// How long a single-time task counts as active after its start.
    pub active_window_minutes: u32,
    /// How long after a window ends the task may still be marked.
    pub completion_grace_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            active_window_minutes: DEFAULT_ACTIVE_WINDOW_MINUTES,
            completion_grace_minutes: DEFAULT_COMPLETION_GRACE_MINUTES,
        }
    }
}

impl ScheduleConfig {
    pub fn active_window(&self) -> Duration {
        Duration::minutes(i64::from(self.active_window_minutes))
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::minutes(i64::from(self.completion_grace_minutes))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.active_window_minutes == 0 {
            return Err(ConfigError::Invalid(
                "schedule.active_window_minutes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reminder planning options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReminderConfig {
    /// Minutes before a timed task's start to fire the reminder.
    pub lead_minutes: u32,
    /// `HH:MM` reminder time for tasks without a time.
    pub unscheduled_reminder_time: String,
    /// Whether to schedule a "mark your task" prompt at the window end.
    pub completion_prompt: bool,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lead_minutes: DEFAULT_REMINDER_LEAD_MINUTES,
            unscheduled_reminder_time: DEFAULT_UNSCHEDULED_REMINDER_TIME.to_string(),
            completion_prompt: true,
        }
    }
}

impl ReminderConfig {
    pub fn lead(&self) -> Duration {
        Duration::minutes(i64::from(self.lead_minutes))
    }

    /// Parsed reminder time of day for unscheduled tasks.
    pub fn unscheduled_time(&self) -> Result<NaiveTime, FormatError> {
        parse_time_of_day(&self.unscheduled_reminder_time)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.unscheduled_time()
            .map(|_| ())
            .map_err(|err| ConfigError::Invalid(format!("reminders.unscheduled_reminder_time: {err}")))
    }
}
