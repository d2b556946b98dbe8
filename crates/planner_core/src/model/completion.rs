//! Completion state machine.
//!
//! # Invariants
//! - `Unmarked` is only ever the initial state; no transition leads back to it.
//! - Every transition is gated by a `MarkVerdict`; a blocked verdict leaves the
//!   state untouched.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::schedule::window::{MarkBlockReason, MarkVerdict};

/// Completion state of a task, or of one participant of a global task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    #[default]
    Unmarked,
    Completed,
    Uncompleted,
}

/// Explicit target for `CompletionAction::Set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMark {
    Completed,
    Uncompleted,
}

/// User action on a task's completion checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionAction {
    /// `Unmarked -> Completed`, `Completed <-> Uncompleted`.
    Toggle,
    /// Force a state; setting the current state again is a no-op.
    Set(CompletionMark),
}

/// Rejected completion transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionError {
    TooEarly,
    Expired,
}

impl Display for CompletionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooEarly => write!(f, "task cannot be marked before it starts"),
            Self::Expired => write!(f, "task marking window has expired"),
        }
    }
}

impl Error for CompletionError {}

impl From<MarkBlockReason> for CompletionError {
    fn from(value: MarkBlockReason) -> Self {
        match value {
            MarkBlockReason::TooEarly => Self::TooEarly,
            MarkBlockReason::Expired => Self::Expired,
        }
    }
}

impl CompletionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unmarked => "unmarked",
            Self::Completed => "completed",
            Self::Uncompleted => "uncompleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unmarked" => Some(Self::Unmarked),
            "completed" => Some(Self::Completed),
            "uncompleted" => Some(Self::Uncompleted),
            _ => None,
        }
    }

    pub fn is_marked(self) -> bool {
        self != Self::Unmarked
    }

    /// Returns the state reached by `action`, without the window gate.
    pub fn next(self, action: CompletionAction) -> Self {
        match (self, action) {
            (Self::Completed, CompletionAction::Toggle) => Self::Uncompleted,
            (_, CompletionAction::Toggle) => Self::Completed,
            (_, CompletionAction::Set(CompletionMark::Completed)) => Self::Completed,
            (_, CompletionAction::Set(CompletionMark::Uncompleted)) => Self::Uncompleted,
        }
    }

    /// Applies `action` if the window verdict allows marking.
    pub fn transition(
        self,
        action: CompletionAction,
        verdict: MarkVerdict,
    ) -> Result<Self, CompletionError> {
        match verdict.reason {
            Some(reason) => Err(reason.into()),
            None => Ok(self.next(action)),
        }
    }
}
