//! Runtime session identifiers.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Minimum length the runtime accepts for a session id.
pub const MIN_SESSION_ID_LEN: usize = 33;

/// Session id the entrypoint assumes when the caller sends none.
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("session id must be at least {min} characters, got {len}")]
pub struct SessionIdError {
    pub len: usize,
    pub min: usize,
}

/// Caller-chosen id that correlates invocations into one conversation.
///
/// Only the length is checked; the runtime interprets the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// `{prefix}-{uuid}`; always long enough.
    pub fn generate(prefix: &str) -> Self {
        SessionId(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let len = s.chars().count();
        if len < MIN_SESSION_ID_LEN {
            return Err(SessionIdError {
                len,
                min: MIN_SESSION_ID_LEN,
            });
        }
        Ok(SessionId(s))
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SessionId::try_from(s.to_string())
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_meet_minimum() {
        let id = SessionId::generate("a");
        assert!(id.as_str().len() >= MIN_SESSION_ID_LEN);
        assert!(id.as_str().starts_with("a-"));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(SessionId::generate("s"), SessionId::generate("s"));
    }

    #[test]
    fn test_short_id_rejected() {
        let err = "too-short".parse::<SessionId>().unwrap_err();
        assert_eq!(err.len, 9);
        assert_eq!(err.min, MIN_SESSION_ID_LEN);
    }

    #[test]
    fn test_exact_minimum_accepted() {
        let raw = "x".repeat(MIN_SESSION_ID_LEN);
        let id: SessionId = raw.parse().unwrap();
        assert_eq!(id.as_str(), raw);
    }
}
