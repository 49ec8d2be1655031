//! Teardown of deployed resources.
//!
//! Every step is attempted regardless of earlier failures. Failures are
//! logged and recorded, never returned as errors.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cloud::{ContainerRegistry, IdentityService, RuntimeControl};
use crate::obs;

/// Outcome of a single cleanup step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStep {
    pub resource: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub steps: Vec<CleanupStep>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|s| s.error.is_none())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CleanupStep> {
        self.steps.iter().filter(|s| s.error.is_some())
    }

    fn record<E: std::fmt::Display>(&mut self, resource: String, result: Result<(), E>) {
        let error = match result {
            Ok(()) => {
                info!(resource = %resource, "deleted");
                None
            }
            Err(e) => {
                obs::emit_cleanup_failed(&resource, &e);
                Some(e.to_string())
            }
        };
        self.steps.push(CleanupStep { resource, error });
    }
}

/// Delete the runtime, the repository (with its images) and the execution
/// role (after detaching its policies).
pub async fn cleanup(
    control: &dyn RuntimeControl,
    registry: &dyn ContainerRegistry,
    identity: &dyn IdentityService,
    agent_id: &str,
    repository_name: &str,
    role_name: &str,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    report.record(
        format!("runtime {}", agent_id),
        control.delete_runtime(agent_id).await,
    );
    report.record(
        format!("repository {}", repository_name),
        registry.delete_repository(repository_name, true).await,
    );
    report.record(
        format!("role {}", role_name),
        delete_role(identity, role_name).await,
    );

    report
}

async fn delete_role(
    identity: &dyn IdentityService,
    role_name: &str,
) -> crate::cloud::CloudResult<()> {
    for policy in identity.list_attached_role_policies(role_name).await? {
        identity.detach_role_policy(role_name, &policy).await?;
    }
    identity.delete_role(role_name).await
}
