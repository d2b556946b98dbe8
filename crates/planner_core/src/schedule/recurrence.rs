//! Recurrence expansion.
//!
//! # Responsibility
//! - Turn one task definition plus a recurrence mode into the concrete list
//!   of calendar days it is materialized on.
//!
//! # Invariants
//! - Output is never empty.
//! - `Weekly` never leaves the start day's month.
//! - `Custom` yields exactly the caller's days (first occurrence wins on
//!   duplicates, caller order kept).

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::schedule::codec::{format_date, parse_date, FormatError};

const DAYS_PER_WEEK: i64 = 7;

/// How many calendar days one task definition expands into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "dates", rename_all = "snake_case")]
pub enum RecurrenceMode {
    Once,
    /// Same weekday, every week, until the end of the start month.
    Weekly,
    /// Caller-selected `DD.MM.YYYY` days.
    Custom(Vec<String>),
}

impl RecurrenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Weekly => "weekly",
            Self::Custom(_) => "custom",
        }
    }
}

/// Recurrence expansion error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    Format(FormatError),
    /// `Custom` mode was given no days.
    EmptyCustomDates,
}

impl Display for RecurrenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(err) => write!(f, "{err}"),
            Self::EmptyCustomDates => write!(f, "custom recurrence requires at least one date"),
        }
    }
}

impl Error for RecurrenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format(err) => Some(err),
            Self::EmptyCustomDates => None,
        }
    }
}

impl From<FormatError> for RecurrenceError {
    fn from(value: FormatError) -> Self {
        Self::Format(value)
    }
}

/// Expands `start` into the days the task applies to.
///
/// `start` is validated even in `Custom` mode, where it is not part of the
/// output.
pub fn expand_dates(
    start: NaiveDate,
    mode: &RecurrenceMode,
) -> Result<Vec<NaiveDate>, RecurrenceError> {
    match mode {
        RecurrenceMode::Once => Ok(vec![start]),
        RecurrenceMode::Weekly => Ok(weekly_in_month(start)),
        RecurrenceMode::Custom(raw_dates) => {
            if raw_dates.is_empty() {
                return Err(RecurrenceError::EmptyCustomDates);
            }
            let mut seen = BTreeSet::new();
            let mut dates = Vec::with_capacity(raw_dates.len());
            for raw in raw_dates {
                let date = parse_date(raw)?;
                if seen.insert(date) {
                    dates.push(date);
                }
            }
            Ok(dates)
        }
    }
}

/// String form of `expand_dates`: `DD.MM.YYYY` in, canonical `DD.MM.YYYY` out.
pub fn expand_recurrence(
    start: &str,
    mode: &RecurrenceMode,
) -> Result<Vec<String>, RecurrenceError> {
    let start = parse_date(start)?;
    Ok(expand_dates(start, mode)?
        .into_iter()
        .map(format_date)
        .collect())
}

fn weekly_in_month(start: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = vec![start];
    let mut current = start;
    while let Some(next) = current.checked_add_signed(Duration::days(DAYS_PER_WEEK)) {
        if next.month() != start.month() || next.year() != start.year() {
            break;
        }
        dates.push(next);
        current = next;
    }
    dates
}
