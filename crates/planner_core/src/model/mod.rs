//! Planner domain model.
//!
//! # Responsibility
//! - Define the task record and its completion state machine.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Recurrence is materialized into independent task records; there is no
//!   series entity.

pub mod completion;
pub mod task;
