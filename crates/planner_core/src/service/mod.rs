//! Planner use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, feed and scheduler calls into use-case APIs.
//! - Keep UI/FFI layers decoupled from storage and SDK details.

pub mod reminder_service;
pub mod task_service;
