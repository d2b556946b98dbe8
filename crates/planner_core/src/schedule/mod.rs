//! Pure scheduling core: date codec, recurrence, activity windows.
//!
//! # Responsibility
//! - Own every date/time computation the planner performs.
//! - Stay free of I/O, identity and persistence concerns.
//!
//! # Invariants
//! - Functions are synchronous and deterministic; "now" is always a parameter.
//! - Malformed strings fail with `FormatError`; nothing is coerced.

pub mod codec;
pub mod recurrence;
pub mod window;
