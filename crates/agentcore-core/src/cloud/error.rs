//! Provider-level error taxonomy.

use thiserror::Error;

/// Errors surfaced by a cloud provider or the tool standing in for it.
#[derive(Error, Debug)]
pub enum CloudError {
    /// The provider reported that the resource already exists.
    #[error("{resource} already exists: {name}")]
    AlreadyExists { resource: String, name: String },

    /// The provider rejected a create call because of a naming conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requested resource does not exist.
    #[error("{resource} not found: {name}")]
    NotFound { resource: String, name: String },

    /// Any other provider error, keyed by the provider's error code.
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The command driving the provider failed without a recognisable error code.
    #[error("command failed: {0}")]
    Command(String),

    /// The provider answered with something we could not decode.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl CloudError {
    /// Whether this error is the provider's "resource already exists" signal.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists { .. })
    }

    /// Whether this error is a create-time naming conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CloudError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for CloudError {
    fn from(err: std::io::Error) -> Self {
        CloudError::Command(err.to_string())
    }
}

/// Result type for provider calls
pub type CloudResult<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_display() {
        let err = CloudError::AlreadyExists {
            resource: "repository".to_string(),
            name: "agentcore/demo".to_string(),
        };
        assert!(err.is_already_exists());
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "repository already exists: agentcore/demo");
    }

    #[test]
    fn test_service_error_keeps_code() {
        let err = CloudError::Service {
            code: "AccessDeniedException".to_string(),
            message: "not authorized".to_string(),
        };
        assert!(err.to_string().starts_with("AccessDeniedException"));
    }
}
