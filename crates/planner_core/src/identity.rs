//! Caller identity passed explicitly into every service call.
//!
//! # Responsibility
//! - Define the user identity shape supplied by the host's auth provider.
//! - Keep core logic free of ambient "current user" state.
//!
//! # Invariants
//! - `UserId` is never empty or whitespace-padded.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable user identifier issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Rejected user identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidUserId(pub String);

impl Display for InvalidUserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid user id `{}`", self.0)
    }
}

impl Error for InvalidUserId {}

impl UserId {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidUserId> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.len() != value.len() {
            return Err(InvalidUserId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = InvalidUserId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    /// Admins may publish global tasks.
    pub is_admin: bool,
}

impl CurrentUser {
    pub fn member(id: UserId) -> Self {
        Self {
            id,
            is_admin: false,
        }
    }

    pub fn admin(id: UserId) -> Self {
        Self { id, is_admin: true }
    }
}

/// Source of the current identity (the host's auth SDK).
pub trait AuthProvider {
    fn current_user(&self) -> Option<CurrentUser>;
}

/// Auth provider with a fixed answer; used by the FFI layer and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthProvider {
    user: Option<CurrentUser>,
}

impl StaticAuthProvider {
    pub fn signed_in(user: CurrentUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

impl AuthProvider for StaticAuthProvider {
    fn current_user(&self) -> Option<CurrentUser> {
        self.user.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_blank_and_padded_values() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
        assert!(UserId::new(" uid-1").is_err());
        assert_eq!(UserId::new("uid-1").unwrap().as_str(), "uid-1");
    }

    #[test]
    fn static_provider_reports_configured_identity() {
        let user = CurrentUser::admin(UserId::new("root").unwrap());
        assert_eq!(
            StaticAuthProvider::signed_in(user.clone()).current_user(),
            Some(user)
        );
        assert_eq!(StaticAuthProvider::signed_out().current_user(), None);
    }
}
