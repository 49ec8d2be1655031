//! Deployment target and the resource handles a deployment produces.

use serde::{Deserialize, Serialize};

use crate::domain::error::{DeployError, Result};

/// The agent being deployed, with every dependent resource name derived from it.
///
/// Fields are private: the name cannot change once a deployment starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    name: String,
    region: String,
    account_id: String,
}

impl DeploymentTarget {
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let region = region.into();
        if name.trim().is_empty() {
            return Err(DeployError::Config("agent name must not be empty".to_string()));
        }
        if region.trim().is_empty() {
            return Err(DeployError::Config("region must not be empty".to_string()));
        }
        Ok(Self {
            name,
            region,
            account_id: account_id.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn repository_name(&self) -> String {
        format!("agentcore/{}", self.name)
    }

    pub fn role_name(&self) -> String {
        format!("AgentCoreExecutionRole-{}", self.name)
    }

    pub fn build_project_name(&self) -> String {
        format!("agentcore-build-{}", self.name)
    }

    pub fn build_role_name(&self) -> String {
        format!("CodeBuildRole-{}", self.name)
    }

    pub fn source_bucket(&self) -> String {
        format!("agentcore-build-{}-{}", self.account_id, self.region)
    }

    pub fn source_key(&self) -> String {
        format!("{}/source.zip", self.name)
    }
}

/// Fully qualified container image: repository URI plus tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub repository_uri: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository_uri: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository_uri: repository_uri.into(),
            tag: tag.into(),
        }
    }

    /// Registry host part of the repository URI.
    pub fn registry_host(&self) -> &str {
        self.repository_uri
            .split('/')
            .next()
            .unwrap_or(&self.repository_uri)
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository_uri, self.tag)
    }
}

/// The role a runtime executes as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionIdentity {
    pub role_name: String,
    pub role_arn: String,
}

/// A created or updated runtime and what it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInstance {
    pub agent_id: String,
    pub agent_arn: String,
    pub image: ImageReference,
    pub role_arn: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> DeploymentTarget {
        DeploymentTarget::new("demo_agent", "us-west-2", "123456789012").unwrap()
    }

    #[test]
    fn test_derived_names() {
        let t = target();
        assert_eq!(t.repository_name(), "agentcore/demo_agent");
        assert_eq!(t.role_name(), "AgentCoreExecutionRole-demo_agent");
        assert_eq!(t.build_project_name(), "agentcore-build-demo_agent");
        assert_eq!(t.build_role_name(), "CodeBuildRole-demo_agent");
        assert_eq!(t.source_bucket(), "agentcore-build-123456789012-us-west-2");
        assert_eq!(t.source_key(), "demo_agent/source.zip");
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = DeploymentTarget::new("  ", "us-east-1", "1").unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
    }

    #[test]
    fn test_image_reference_display_and_host() {
        let image = ImageReference::new(
            "123456789012.dkr.ecr.us-west-2.amazonaws.com/agentcore/demo_agent",
            "latest",
        );
        assert_eq!(
            image.to_string(),
            "123456789012.dkr.ecr.us-west-2.amazonaws.com/agentcore/demo_agent:latest"
        );
        assert_eq!(
            image.registry_host(),
            "123456789012.dkr.ecr.us-west-2.amazonaws.com"
        );
    }
}
