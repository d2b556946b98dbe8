//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by agenda, calendar and global
//!   event views.
//! - Own per-participant completion state for global tasks.
//!
//! # Invariants
//! - `date` is a calendar day; its persisted `DD.MM.YYYY` form and day
//!   timestamp are both derived from it and never stored independently.
//! - A range time has `from <= to`.
//! - Personal tasks never carry participants.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::identity::UserId;
use crate::model::completion::CompletionState;
use crate::schedule::codec::format_date;
use crate::schedule::window::TaskSchedule;

/// Stable identifier for every task record.
pub type TaskId = Uuid;

/// Color assigned to tasks created without an explicit one.
pub const DEFAULT_TASK_COLOR: &str = "#4A90E2";
/// Category assigned to tasks created without an explicit one.
pub const DEFAULT_TASK_CATEGORY: &str = "general";

const MS_PER_DAY: i64 = 86_400_000;

/// Time-of-day shape of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskTime {
    /// Date only; the task is schedulable but never "active".
    Unscheduled,
    /// Single start time.
    At(NaiveTime),
    /// Explicit interval within the task's day.
    Range { from: NaiveTime, to: NaiveTime },
}

impl TaskTime {
    /// Start of the time window, if any.
    pub fn start(&self) -> Option<NaiveTime> {
        match self {
            Self::Unscheduled => None,
            Self::At(at) => Some(*at),
            Self::Range { from, .. } => Some(*from),
        }
    }
}

/// Who can see and join a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskVisibility {
    /// Visible to its owner only.
    Personal,
    /// Published by an admin; any user may join.
    Global,
}

/// Validation errors for task invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyName,
    EmptyCategory,
    InvalidColor(String),
    InvalidTimeRange { from: NaiveTime, to: NaiveTime },
    ParticipantsOnPersonalTask,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "task name cannot be empty"),
            Self::EmptyCategory => write!(f, "task category cannot be empty"),
            Self::InvalidColor(value) => {
                write!(f, "invalid task color `{value}`; expected #RRGGBB")
            }
            Self::InvalidTimeRange { from, to } => write!(
                f,
                "time range end {} is earlier than start {}",
                to.format("%H:%M"),
                from.format("%H:%M")
            ),
            Self::ParticipantsOnPersonalTask => {
                write!(f, "personal tasks cannot have participants")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner: UserId,
    pub name: String,
    pub description: String,
    #[serde(with = "day_format")]
    pub date: NaiveDate,
    pub time: TaskTime,
    /// `#RRGGBB` tag used by calendar markers.
    pub color: String,
    pub category: String,
    pub visibility: TaskVisibility,
    /// Owner's completion state. Meaningful for personal tasks.
    pub completion: CompletionState,
    /// Per-participant completion state. Meaningful for global tasks.
    pub participants: BTreeMap<UserId, CompletionState>,
}

impl Task {
    /// Creates a personal, unscheduled task with a generated ID.
    pub fn new(owner: UserId, name: impl Into<String>, date: NaiveDate) -> Self {
        Self::with_id(Uuid::new_v4(), owner, name, date)
    }

    /// Creates a task with a caller-provided ID.
    pub fn with_id(id: TaskId, owner: UserId, name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id,
            owner,
            name: name.into(),
            description: String::new(),
            date,
            time: TaskTime::Unscheduled,
            color: DEFAULT_TASK_COLOR.to_string(),
            category: DEFAULT_TASK_CATEGORY.to_string(),
            visibility: TaskVisibility::Personal,
            completion: CompletionState::Unmarked,
            participants: BTreeMap::new(),
        }
    }

    /// Validates domain invariants before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.name.trim().is_empty() {
            return Err(TaskValidationError::EmptyName);
        }
        if self.category.trim().is_empty() {
            return Err(TaskValidationError::EmptyCategory);
        }
        if !is_hex_color(&self.color) {
            return Err(TaskValidationError::InvalidColor(self.color.clone()));
        }
        if let TaskTime::Range { from, to } = self.time {
            if to < from {
                return Err(TaskValidationError::InvalidTimeRange { from, to });
            }
        }
        if self.visibility == TaskVisibility::Personal && !self.participants.is_empty() {
            return Err(TaskValidationError::ParticipantsOnPersonalTask);
        }
        Ok(())
    }

    pub fn is_global(&self) -> bool {
        self.visibility == TaskVisibility::Global
    }

    pub fn schedule(&self) -> TaskSchedule {
        TaskSchedule {
            date: self.date,
            time: self.time,
        }
    }

    /// `DD.MM.YYYY` form used as the equality filter key.
    pub fn date_key(&self) -> String {
        format_date(self.date)
    }

    /// Epoch milliseconds of the task day's UTC midnight.
    pub fn day_timestamp_ms(&self) -> i64 {
        day_timestamp_ms(self.date)
    }

    /// Completion state as seen by `user`.
    ///
    /// Returns `None` when `user` neither owns the personal task nor
    /// participates in the global one.
    pub fn completion_for(&self, user: &UserId) -> Option<CompletionState> {
        match self.visibility {
            TaskVisibility::Personal if &self.owner == user => Some(self.completion),
            TaskVisibility::Personal => None,
            TaskVisibility::Global => self.participants.get(user).copied(),
        }
    }

    /// Adds `user` as an unmarked participant. Returns `false` if already joined.
    pub fn join(&mut self, user: UserId) -> bool {
        if self.participants.contains_key(&user) {
            return false;
        }
        self.participants.insert(user, CompletionState::Unmarked);
        true
    }

    /// Removes `user` and its completion state. Returns `false` if absent.
    pub fn leave(&mut self, user: &UserId) -> bool {
        self.participants.remove(user).is_some()
    }
}

/// Epoch milliseconds of `date` at 00:00 UTC.
pub fn day_timestamp_ms(date: NaiveDate) -> i64 {
    // NaiveDate::default() is 1970-01-01.
    date.signed_duration_since(NaiveDate::default()).num_days() * MS_PER_DAY
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

mod day_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::schedule::codec::{format_date, parse_date};

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_date(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_date(&raw).map_err(serde::de::Error::custom)
    }
}
