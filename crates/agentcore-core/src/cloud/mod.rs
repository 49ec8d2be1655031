//! Contracts for the cloud services the deployer talks to.
//!
//! Each trait mirrors the request/response surface of one provider service:
//! - `ContainerRegistry`: image repositories and registry credentials
//! - `IdentityService`: caller account, execution roles and their policies
//! - `ObjectStore`: source bucket and uploads for remote builds
//! - `BuildService`: managed build projects and build status
//! - `RuntimeControl`: agent runtime create/update/list/describe/delete
//! - `RuntimeData`: invocations and session control on a deployed runtime
//!
//! All traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module.

pub mod error;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::build::ImageEngine;
use crate::domain::{BuildStatus, RuntimeStatus};

pub use error::{CloudError, CloudResult};

/// Managed policy ARN prefix for provider-owned policies.
const MANAGED_POLICY_PREFIX: &str = "arn:aws:iam::aws:policy/";

// ---------------------------------------------------------------------------
// ContainerRegistry
// ---------------------------------------------------------------------------

/// A container image repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub uri: String,
}

/// Credentials for pushing to the registry.
#[derive(Clone)]
pub struct RegistryCredentials {
    /// Registry endpoint to log in against
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Create a repository. Fails with `AlreadyExists` if the name is taken.
    async fn create_repository(
        &self,
        name: &str,
        scan_on_push: bool,
    ) -> CloudResult<RepositoryDescriptor>;

    async fn describe_repository(&self, name: &str) -> CloudResult<RepositoryDescriptor>;

    /// Short-lived credentials for the registry endpoint.
    async fn login_credentials(&self) -> CloudResult<RegistryCredentials>;

    /// Delete a repository; `force` removes any images it still holds.
    async fn delete_repository(&self, name: &str, force: bool) -> CloudResult<()>;
}

// ---------------------------------------------------------------------------
// IdentityService
// ---------------------------------------------------------------------------

/// Definition of a service role: who may assume it and what it may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    /// Service principal allowed to assume the role
    pub trust_service: String,
    pub description: Option<String>,
    /// Policy ARNs attached right after creation
    pub policies: Vec<String>,
}

impl RoleSpec {
    /// Execution role assumed by the agent runtime.
    pub fn execution(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trust_service: "bedrock-agentcore.amazonaws.com".to_string(),
            description: Some("Execution role for Bedrock AgentCore Runtime".to_string()),
            policies: managed_policies(&[
                "AmazonBedrockFullAccess",
                "CloudWatchLogsFullAccess",
                "AmazonEC2ContainerRegistryReadOnly",
            ]),
        }
    }

    /// Service role assumed by the managed build service.
    pub fn build_service(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trust_service: "codebuild.amazonaws.com".to_string(),
            description: None,
            policies: managed_policies(&[
                "AmazonEC2ContainerRegistryPowerUser",
                "AmazonS3FullAccess",
                "CloudWatchLogsFullAccess",
            ]),
        }
    }

    /// The assume-role policy document for this role.
    pub fn trust_policy(&self) -> serde_json::Value {
        serde_json::json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Principal": {"Service": self.trust_service},
                    "Action": "sts:AssumeRole",
                }
            ],
        })
    }
}

fn managed_policies(names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| format!("{MANAGED_POLICY_PREFIX}{name}"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    pub name: String,
    pub arn: String,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Account id of the calling principal.
    async fn caller_account(&self) -> CloudResult<String>;

    /// Create a role. Fails with `AlreadyExists` if the name is taken.
    async fn create_role(&self, spec: &RoleSpec) -> CloudResult<RoleDescriptor>;

    async fn get_role(&self, name: &str) -> CloudResult<RoleDescriptor>;

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> CloudResult<()>;

    async fn list_attached_role_policies(&self, role: &str) -> CloudResult<Vec<String>>;

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> CloudResult<()>;

    async fn delete_role(&self, role: &str) -> CloudResult<()>;
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket in `region`. Fails with `AlreadyExists` if we already own it.
    async fn create_bucket(&self, bucket: &str, region: &str) -> CloudResult<()>;

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> CloudResult<()>;
}

// ---------------------------------------------------------------------------
// BuildService
// ---------------------------------------------------------------------------

/// Compute environment of a managed build project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEnvironment {
    #[serde(rename = "type")]
    pub kind: String,
    pub compute_type: String,
    pub image: String,
    pub privileged_mode: bool,
}

impl Default for BuildEnvironment {
    /// ARM64 container builder with a docker daemon available.
    fn default() -> Self {
        Self {
            kind: "ARM_CONTAINER".to_string(),
            compute_type: "BUILD_GENERAL1_SMALL".to_string(),
            image: "aws/codebuild/amazonlinux2-aarch64-standard:3.0".to_string(),
            privileged_mode: true,
        }
    }
}

/// A build project reading its source archive from object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProjectSpec {
    pub name: String,
    /// `bucket/key` of the source archive
    pub source_location: String,
    pub service_role_arn: String,
    pub environment: BuildEnvironment,
}

#[async_trait]
pub trait BuildService: Send + Sync {
    /// Create a project. Fails with `AlreadyExists` if the name is taken.
    async fn create_project(&self, spec: &BuildProjectSpec) -> CloudResult<()>;

    /// Point an existing project at a new source and environment.
    async fn update_project(&self, spec: &BuildProjectSpec) -> CloudResult<()>;

    /// Start a build, returning its id.
    async fn start_build(&self, project: &str) -> CloudResult<String>;

    async fn build_status(&self, build_id: &str) -> CloudResult<BuildStatus>;
}

// ---------------------------------------------------------------------------
// RuntimeControl
// ---------------------------------------------------------------------------

/// Everything a runtime is bound to at create/update time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    pub name: String,
    pub container_uri: String,
    pub role_arn: String,
    pub network_mode: String,
}

/// Identity of a runtime as returned by create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeHandle {
    pub id: String,
    pub arn: String,
}

/// One entry of a runtime listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSummary {
    pub id: String,
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDescription {
    pub id: String,
    pub arn: String,
    pub status: RuntimeStatus,
}

#[async_trait]
pub trait RuntimeControl: Send + Sync {
    /// Create a runtime. Fails with `Conflict` if one with the same name exists.
    async fn create_runtime(&self, spec: &RuntimeSpec) -> CloudResult<RuntimeHandle>;

    async fn list_runtimes(&self) -> CloudResult<Vec<RuntimeSummary>>;

    async fn update_runtime(&self, id: &str, spec: &RuntimeSpec) -> CloudResult<RuntimeHandle>;

    async fn get_runtime(&self, id: &str) -> CloudResult<RuntimeDescription>;

    async fn delete_runtime(&self, id: &str) -> CloudResult<()>;
}

// ---------------------------------------------------------------------------
// RuntimeData
// ---------------------------------------------------------------------------

/// A single invocation of a deployed runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInvocation {
    pub agent_arn: String,
    pub qualifier: String,
    /// Passed through to the runtime untouched
    pub session_id: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSessionOutcome {
    pub session_id: Option<String>,
    pub status_code: Option<u16>,
}

#[async_trait]
pub trait RuntimeData: Send + Sync {
    /// Invoke the runtime and return the fully read response body.
    async fn invoke_runtime(&self, invocation: &RuntimeInvocation) -> CloudResult<Vec<u8>>;

    async fn stop_session(
        &self,
        agent_arn: &str,
        session_id: &str,
        qualifier: &str,
    ) -> CloudResult<StopSessionOutcome>;
}

// ---------------------------------------------------------------------------
// CloudClients
// ---------------------------------------------------------------------------

/// The set of service clients one deployment run works with.
#[derive(Clone)]
pub struct CloudClients {
    pub registry: Arc<dyn ContainerRegistry>,
    pub identity: Arc<dyn IdentityService>,
    pub storage: Arc<dyn ObjectStore>,
    pub builds: Arc<dyn BuildService>,
    pub control: Arc<dyn RuntimeControl>,
    pub data: Arc<dyn RuntimeData>,
    pub image_engine: Arc<dyn ImageEngine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_role_trust_policy() {
        let spec = RoleSpec::execution("AgentCoreExecutionRole-demo");
        let policy = spec.trust_policy();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "bedrock-agentcore.amazonaws.com"
        );
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
        assert_eq!(spec.policies.len(), 3);
        assert!(spec
            .policies
            .iter()
            .all(|p| p.starts_with("arn:aws:iam::aws:policy/")));
    }

    #[test]
    fn test_build_role_has_no_description() {
        let spec = RoleSpec::build_service("CodeBuildRole-demo");
        assert!(spec.description.is_none());
        assert!(spec
            .policies
            .contains(&"arn:aws:iam::aws:policy/AmazonS3FullAccess".to_string()));
    }

    #[test]
    fn test_build_environment_serializes_camel_case() {
        let value = serde_json::to_value(BuildEnvironment::default()).unwrap();
        assert_eq!(value["type"], "ARM_CONTAINER");
        assert_eq!(value["computeType"], "BUILD_GENERAL1_SMALL");
        assert_eq!(value["privilegedMode"], true);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = RegistryCredentials {
            endpoint: "https://123.dkr.ecr.us-east-1.amazonaws.com".to_string(),
            username: "AWS".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
