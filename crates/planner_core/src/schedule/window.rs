//! Activity and completion-window calculator.
//!
//! # Responsibility
//! - Decide whether a task is running right now.
//! - Decide whether a task may be marked completed/uncompleted right now.
//!
//! # Invariants
//! - A task whose date is not `now`'s calendar day is never active.
//! - Unscheduled tasks are never active, only markable within their day
//!   (plus grace).
//! - All bounds are inclusive.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::ScheduleConfig;
use crate::model::task::TaskTime;

/// Date/time part of a task, as consumed by the window calculators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSchedule {
    pub date: NaiveDate,
    pub time: TaskTime,
}

/// Why a task cannot be marked right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkBlockReason {
    TooEarly,
    Expired,
}

impl MarkBlockReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooEarly => "too_early",
            Self::Expired => "expired",
        }
    }
}

/// Outcome of `can_mark_completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkVerdict {
    pub can_mark: bool,
    pub reason: Option<MarkBlockReason>,
}

impl MarkVerdict {
    pub fn allowed() -> Self {
        Self {
            can_mark: true,
            reason: None,
        }
    }

    pub fn blocked(reason: MarkBlockReason) -> Self {
        Self {
            can_mark: false,
            reason: Some(reason),
        }
    }
}

/// Start and end instants of a task's nominal window.
///
/// Unscheduled tasks span their whole day, ending at 23:59:59.
pub fn task_window(
    schedule: &TaskSchedule,
    config: &ScheduleConfig,
) -> (NaiveDateTime, NaiveDateTime) {
    let day = schedule.date;
    match schedule.time {
        TaskTime::Range { from, to } => (day.and_time(from), day.and_time(to)),
        TaskTime::At(at) => {
            let start = day.and_time(at);
            (start, start + config.active_window())
        }
        TaskTime::Unscheduled => (day.and_time(NaiveTime::MIN), end_of_day(day)),
    }
}

/// Returns whether the task is running at `now`.
pub fn is_active(schedule: &TaskSchedule, now: NaiveDateTime, config: &ScheduleConfig) -> bool {
    if schedule.date != now.date() {
        return false;
    }
    if schedule.time == TaskTime::Unscheduled {
        return false;
    }

    let (start, end) = task_window(schedule, config);
    start <= now && now <= end
}

/// Returns whether the task may be marked at `now`, and why not otherwise.
pub fn can_mark_completed(
    schedule: &TaskSchedule,
    now: NaiveDateTime,
    config: &ScheduleConfig,
) -> MarkVerdict {
    let (earliest, end) = task_window(schedule, config);
    let deadline = end + config.completion_grace();

    if now < earliest {
        MarkVerdict::blocked(MarkBlockReason::TooEarly)
    } else if now > deadline {
        MarkVerdict::blocked(MarkBlockReason::Expired)
    } else {
        MarkVerdict::allowed()
    }
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    day.and_time(last_second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
    }

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        day().and_time(hm(hour, minute))
    }

    fn single(hour: u32, minute: u32) -> TaskSchedule {
        TaskSchedule {
            date: day(),
            time: TaskTime::At(hm(hour, minute)),
        }
    }

    fn range() -> TaskSchedule {
        TaskSchedule {
            date: day(),
            time: TaskTime::Range {
                from: hm(9, 0),
                to: hm(10, 0),
            },
        }
    }

    #[test]
    fn single_time_is_active_for_one_hour_inclusive() {
        let config = ScheduleConfig::default();
        let task = single(10, 0);
        assert!(!is_active(&task, at(9, 59), &config));
        assert!(is_active(&task, at(10, 0), &config));
        assert!(is_active(&task, at(10, 30), &config));
        assert!(is_active(&task, at(11, 0), &config));
        assert!(!is_active(&task, at(11, 1), &config));
    }

    #[test]
    fn range_is_active_within_bounds() {
        let config = ScheduleConfig::default();
        assert!(is_active(&range(), at(9, 0), &config));
        assert!(is_active(&range(), at(10, 0), &config));
        assert!(!is_active(&range(), at(10, 1), &config));
    }

    #[test]
    fn other_days_and_unscheduled_tasks_are_never_active() {
        let config = ScheduleConfig::default();
        let tomorrow = day().succ_opt().unwrap().and_time(hm(10, 30));
        assert!(!is_active(&single(10, 0), tomorrow, &config));

        let unscheduled = TaskSchedule {
            date: day(),
            time: TaskTime::Unscheduled,
        };
        assert!(!is_active(&unscheduled, at(12, 0), &config));
    }

    #[test]
    fn range_marking_window_has_three_outcomes() {
        let config = ScheduleConfig::default();
        assert_eq!(
            can_mark_completed(&range(), at(8, 0), &config),
            MarkVerdict::blocked(MarkBlockReason::TooEarly)
        );
        assert_eq!(
            can_mark_completed(&range(), at(9, 30), &config),
            MarkVerdict::allowed()
        );
        assert_eq!(
            can_mark_completed(&range(), at(10, 30), &config),
            MarkVerdict::allowed()
        );
        assert_eq!(
            can_mark_completed(&range(), at(10, 31), &config),
            MarkVerdict::blocked(MarkBlockReason::Expired)
        );
    }

    #[test]
    fn single_time_deadline_is_window_end_plus_grace() {
        let config = ScheduleConfig::default();
        let task = single(10, 0);
        assert!(can_mark_completed(&task, at(11, 30), &config).can_mark);
        assert_eq!(
            can_mark_completed(&task, at(11, 31), &config).reason,
            Some(MarkBlockReason::Expired)
        );
    }

    #[test]
    fn unscheduled_task_is_markable_all_day_and_into_grace() {
        let config = ScheduleConfig::default();
        let task = TaskSchedule {
            date: day(),
            time: TaskTime::Unscheduled,
        };
        assert!(can_mark_completed(&task, at(0, 0), &config).can_mark);
        assert!(can_mark_completed(&task, at(23, 59), &config).can_mark);

        let next_day = day().succ_opt().unwrap();
        assert!(can_mark_completed(&task, next_day.and_time(hm(0, 29)), &config).can_mark);
        assert_eq!(
            can_mark_completed(&task, next_day.and_time(hm(0, 30)), &config).reason,
            Some(MarkBlockReason::Expired)
        );

        let previous_day = day().pred_opt().unwrap().and_time(hm(23, 0));
        assert_eq!(
            can_mark_completed(&task, previous_day, &config).reason,
            Some(MarkBlockReason::TooEarly)
        );
    }

    #[test]
    fn configured_constants_change_the_windows() {
        let config = ScheduleConfig {
            active_window_minutes: 15,
            completion_grace_minutes: 0,
        };
        let task = single(10, 0);
        assert!(!is_active(&task, at(10, 16), &config));
        assert!(can_mark_completed(&task, at(10, 15), &config).can_mark);
        assert!(!can_mark_completed(&task, at(10, 16), &config).can_mark);
    }
}
