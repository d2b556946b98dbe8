//! Date/time string codec.
//!
//! # Responsibility
//! - Parse `DD.MM.YYYY`, `HH:MM` and `HH:MM-HH:MM` inputs into chrono values.
//! - Format calendar days and times back to their canonical, zero-padded form.
//!
//! # Invariants
//! - `parse_date(&format_date(d))` yields `d` for every valid date.
//! - Malformed input fails fast with `FormatError`; nothing is coerced.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::task::TaskTime;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("valid date regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid time regex"));

/// Error for malformed date/time strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Input is not three dot-separated numeric fields.
    MalformedDate(String),
    /// Fields are numeric but do not form a calendar day (e.g. `31.02.2024`).
    InvalidDate(String),
    /// Input is not `HH:MM`.
    MalformedTime(String),
    /// Hour or minute is out of range.
    InvalidTime(String),
    /// Input is not `HH:MM-HH:MM`.
    MalformedTimeRange(String),
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDate(value) => {
                write!(f, "malformed date `{value}`; expected DD.MM.YYYY")
            }
            Self::InvalidDate(value) => write!(f, "`{value}` is not a calendar day"),
            Self::MalformedTime(value) => write!(f, "malformed time `{value}`; expected HH:MM"),
            Self::InvalidTime(value) => write!(f, "`{value}` is not a valid time of day"),
            Self::MalformedTimeRange(value) => {
                write!(f, "malformed time range `{value}`; expected HH:MM-HH:MM")
            }
        }
    }
}

impl Error for FormatError {}

/// Parses a `DD.MM.YYYY` string into a calendar day.
///
/// Single-digit day and month fields are accepted (`1.2.2024`); the year must
/// have four digits.
pub fn parse_date(value: &str) -> Result<NaiveDate, FormatError> {
    let trimmed = value.trim();
    let captures = DATE_RE
        .captures(trimmed)
        .ok_or_else(|| FormatError::MalformedDate(value.to_string()))?;

    let field = |index: usize| -> Result<u32, FormatError> {
        captures[index]
            .parse::<u32>()
            .map_err(|_| FormatError::MalformedDate(value.to_string()))
    };
    let day = field(1)?;
    let month = field(2)?;
    let year = field(3)? as i32;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| FormatError::InvalidDate(value.to_string()))
}

/// Parses an `HH:MM` string into a time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, FormatError> {
    let trimmed = value.trim();
    let captures = TIME_RE
        .captures(trimmed)
        .ok_or_else(|| FormatError::MalformedTime(value.to_string()))?;

    let hour = captures[1]
        .parse::<u32>()
        .map_err(|_| FormatError::MalformedTime(value.to_string()))?;
    let minute = captures[2]
        .parse::<u32>()
        .map_err(|_| FormatError::MalformedTime(value.to_string()))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| FormatError::InvalidTime(value.to_string()))
}

/// Combines an `HH:MM` string with the given calendar day.
pub fn parse_time(value: &str, on_date: NaiveDate) -> Result<NaiveDateTime, FormatError> {
    Ok(on_date.and_time(parse_time_of_day(value)?))
}

/// Parses an `HH:MM-HH:MM` string into its two bounds.
///
/// Ordering of the bounds is not checked here; task validation owns that rule.
pub fn parse_time_range(value: &str) -> Result<(NaiveTime, NaiveTime), FormatError> {
    let (from, to) = value
        .split_once('-')
        .ok_or_else(|| FormatError::MalformedTimeRange(value.to_string()))?;
    if to.contains('-') {
        return Err(FormatError::MalformedTimeRange(value.to_string()));
    }
    Ok((parse_time_of_day(from)?, parse_time_of_day(to)?))
}

/// Parses the time field of a task form.
///
/// Empty input means the task is unscheduled; a `-` selects range form.
pub fn parse_task_time(value: &str) -> Result<TaskTime, FormatError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(TaskTime::Unscheduled);
    }
    if trimmed.contains('-') {
        let (from, to) = parse_time_range(trimmed)?;
        return Ok(TaskTime::Range { from, to });
    }
    Ok(TaskTime::At(parse_time_of_day(trimmed)?))
}

/// Formats a calendar day as zero-padded `DD.MM.YYYY`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Formats a time of day as zero-padded `HH:MM`.
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Formats a task time back to its form representation.
pub fn format_task_time(time: &TaskTime) -> String {
    match time {
        TaskTime::Unscheduled => String::new(),
        TaskTime::At(at) => format_time(*at),
        TaskTime::Range { from, to } => format!("{}-{}", format_time(*from), format_time(*to)),
    }
}
