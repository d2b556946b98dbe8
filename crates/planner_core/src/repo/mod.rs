//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the task data-access contract used by services and the live feed.
//! - Isolate SQLite query details from use-case orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Task::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod task_repo;
