//! Errors at the invocation boundary.
//!
//! Every variant degrades to an error envelope; none changes the HTTP status.

use chrono::{DateTime, Utc};
use thiserror::Error;

use agentcore_core::{PayloadError, ResponseEnvelope};

#[derive(Error, Debug)]
pub enum InvocationError {
    /// The request body is not a usable invocation payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The upstream connection could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// The assistant API answered with an error.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The response stream broke off or carried an error event.
    #[error("stream error: {0}")]
    Stream(String),
}

impl InvocationError {
    pub fn kind(&self) -> &'static str {
        match self {
            InvocationError::InvalidPayload(_) => "invalid_payload",
            InvocationError::Connection(_) => "connection",
            InvocationError::Upstream { .. } => "upstream",
            InvocationError::Stream(_) => "stream",
        }
    }

    pub fn into_envelope(self, request_timestamp: DateTime<Utc>) -> ResponseEnvelope {
        ResponseEnvelope::failure(self.to_string(), request_timestamp)
    }
}

impl From<PayloadError> for InvocationError {
    fn from(err: PayloadError) -> Self {
        InvocationError::InvalidPayload(err.to_string())
    }
}

impl From<serde_json::Error> for InvocationError {
    fn from(err: serde_json::Error) -> Self {
        InvocationError::InvalidPayload(err.to_string())
    }
}

/// Errors reading [`crate::AgentConfig`] from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
