//! Deployment lifecycle error taxonomy.

use crate::cloud::CloudError;
use crate::domain::session::SessionIdError;

/// Errors that abort a deployment, build, invocation or harness run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("build failed with status: {status}")]
    BuildFailed { status: String },

    #[error("runtime reached failure status: {status}")]
    RuntimeFailed { status: String },

    #[error("timed out after {waited_secs}s waiting for {resource}")]
    TimedOut { resource: String, waited_secs: u64 },

    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("subprocess failed: {0}")]
    Subprocess(String),

    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("invalid session id: {0}")]
    InvalidSession(#[from] SessionIdError),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for DeployError {
    fn from(err: zip::result::ZipError) -> Self {
        DeployError::Archive(err.to_string())
    }
}

/// Result type for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_failed_carries_status() {
        let err = DeployError::BuildFailed {
            status: "FAULT".to_string(),
        };
        assert_eq!(err.to_string(), "build failed with status: FAULT");
    }

    #[test]
    fn test_timed_out_display() {
        let err = DeployError::TimedOut {
            resource: "runtime rt-1".to_string(),
            waited_secs: 600,
        };
        let msg = err.to_string();
        assert!(msg.contains("600s"));
        assert!(msg.contains("runtime rt-1"));
    }

    #[test]
    fn test_cloud_error_converts() {
        let err: DeployError = CloudError::Conflict("name taken".to_string()).into();
        assert!(matches!(err, DeployError::Cloud(CloudError::Conflict(_))));
    }
}
