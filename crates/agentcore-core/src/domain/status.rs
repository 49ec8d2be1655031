//! Provider status values for builds and runtimes.

use serde::{Deserialize, Serialize};

/// Status of a managed build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildStatus {
    InProgress,
    Succeeded,
    Failed,
    Fault,
    Stopped,
    TimedOut,
    Other(String),
}

impl BuildStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "IN_PROGRESS" => BuildStatus::InProgress,
            "SUCCEEDED" => BuildStatus::Succeeded,
            "FAILED" => BuildStatus::Failed,
            "FAULT" => BuildStatus::Fault,
            "STOPPED" => BuildStatus::Stopped,
            "TIMED_OUT" => BuildStatus::TimedOut,
            other => BuildStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BuildStatus::InProgress => "IN_PROGRESS",
            BuildStatus::Succeeded => "SUCCEEDED",
            BuildStatus::Failed => "FAILED",
            BuildStatus::Fault => "FAULT",
            BuildStatus::Stopped => "STOPPED",
            BuildStatus::TimedOut => "TIMED_OUT",
            BuildStatus::Other(s) => s,
        }
    }

    /// Statuses after which a build will not change again.
    pub fn terminal_set() -> Vec<BuildStatus> {
        vec![
            BuildStatus::Succeeded,
            BuildStatus::Failed,
            BuildStatus::Fault,
            BuildStatus::Stopped,
            BuildStatus::TimedOut,
        ]
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BuildStatus::Failed | BuildStatus::Fault | BuildStatus::Stopped | BuildStatus::TimedOut
        )
    }
}

impl From<String> for BuildStatus {
    fn from(s: String) -> Self {
        BuildStatus::parse(&s)
    }
}

impl From<BuildStatus> for String {
    fn from(status: BuildStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of an agent runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuntimeStatus {
    Creating,
    Updating,
    Ready,
    CreateFailed,
    UpdateFailed,
    Deleting,
    DeleteFailed,
    Other(String),
}

impl RuntimeStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "CREATING" => RuntimeStatus::Creating,
            "UPDATING" => RuntimeStatus::Updating,
            "READY" => RuntimeStatus::Ready,
            "CREATE_FAILED" => RuntimeStatus::CreateFailed,
            "UPDATE_FAILED" => RuntimeStatus::UpdateFailed,
            "DELETING" => RuntimeStatus::Deleting,
            "DELETE_FAILED" => RuntimeStatus::DeleteFailed,
            other => RuntimeStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuntimeStatus::Creating => "CREATING",
            RuntimeStatus::Updating => "UPDATING",
            RuntimeStatus::Ready => "READY",
            RuntimeStatus::CreateFailed => "CREATE_FAILED",
            RuntimeStatus::UpdateFailed => "UPDATE_FAILED",
            RuntimeStatus::Deleting => "DELETING",
            RuntimeStatus::DeleteFailed => "DELETE_FAILED",
            RuntimeStatus::Other(s) => s,
        }
    }

    /// Statuses that end a readiness wait.
    pub fn terminal_set() -> Vec<RuntimeStatus> {
        vec![
            RuntimeStatus::Ready,
            RuntimeStatus::CreateFailed,
            RuntimeStatus::DeleteFailed,
            RuntimeStatus::UpdateFailed,
        ]
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RuntimeStatus::Ready)
    }
}

impl From<String> for RuntimeStatus {
    fn from(s: String) -> Self {
        RuntimeStatus::parse(&s)
    }
}

impl From<RuntimeStatus> for String {
    fn from(status: RuntimeStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_status_parse_known_and_unknown() {
        assert_eq!(BuildStatus::parse("SUCCEEDED"), BuildStatus::Succeeded);
        assert_eq!(BuildStatus::parse("TIMED_OUT"), BuildStatus::TimedOut);
        assert_eq!(
            BuildStatus::parse("QUEUED"),
            BuildStatus::Other("QUEUED".to_string())
        );
        assert_eq!(BuildStatus::parse("QUEUED").as_str(), "QUEUED");
    }

    #[test]
    fn test_build_failure_set() {
        for status in BuildStatus::terminal_set() {
            assert_eq!(status.is_failure(), status != BuildStatus::Succeeded);
        }
        assert!(!BuildStatus::InProgress.is_failure());
    }

    #[test]
    fn test_runtime_terminal_set() {
        let terminal = RuntimeStatus::terminal_set();
        assert!(terminal.contains(&RuntimeStatus::Ready));
        assert!(terminal.contains(&RuntimeStatus::UpdateFailed));
        assert!(!terminal.contains(&RuntimeStatus::Creating));
        assert!(!terminal.contains(&RuntimeStatus::Deleting));
    }

    #[test]
    fn test_runtime_status_serde_as_string() {
        let json = serde_json::to_string(&RuntimeStatus::CreateFailed).unwrap();
        assert_eq!(json, "\"CREATE_FAILED\"");
        let back: RuntimeStatus = serde_json::from_str("\"READY\"").unwrap();
        assert!(back.is_ready());
    }
}
