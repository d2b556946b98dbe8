//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `planner_core` linkage.
//! - Preview recurrence expansion without a database.
//!
//! Usage: `planner_cli [DD.MM.YYYY [once|weekly|custom [DD.MM.YYYY...]]]`

use planner_core::{expand_recurrence, RecurrenceMode};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("planner_core ping={}", planner_core::ping());
    println!("planner_core version={}", planner_core::core_version());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((start, rest)) = args.split_first() else {
        return ExitCode::SUCCESS;
    };

    let mode = match rest.first().map(String::as_str) {
        None | Some("once") => RecurrenceMode::Once,
        Some("weekly") => RecurrenceMode::Weekly,
        Some("custom") => RecurrenceMode::Custom(rest[1..].to_vec()),
        Some(other) => {
            eprintln!("unsupported recurrence `{other}`; expected once|weekly|custom");
            return ExitCode::FAILURE;
        }
    };

    match expand_recurrence(start, &mode) {
        Ok(dates) => {
            for date in dates {
                println!("{date}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("recurrence preview failed: {err}");
            ExitCode::FAILURE
        }
    }
}
