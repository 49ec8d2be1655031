//! End-to-end deployment: provision, build, bind the runtime, wait for it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, Instrument};

use crate::build::build_and_push;
use crate::cleanup::{cleanup, CleanupReport};
use crate::cloud::{CloudClients, RoleSpec, RuntimeDescription};
use crate::config::DeployConfig;
use crate::domain::{
    DeployError, DeploymentTarget, ExecutionIdentity, ImageReference, Result, RuntimeInstance,
    RuntimeStatus, SessionId,
};
use crate::invoke::invoke;
use crate::obs::deploy_span;
use crate::provision::{ensure_repository, ensure_role};
use crate::runtime::{create_or_update_runtime, wait_for_ready};

/// Everything a successful deployment produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub target: DeploymentTarget,
    pub repository_uri: String,
    pub image: ImageReference,
    pub identity: ExecutionIdentity,
    pub runtime: RuntimeInstance,
    pub status: RuntimeStatus,
}

/// Drives one agent through the deployment lifecycle.
pub struct Deployer {
    clients: CloudClients,
    target: DeploymentTarget,
    config: DeployConfig,
}

impl Deployer {
    pub fn new(clients: CloudClients, target: DeploymentTarget, config: DeployConfig) -> Self {
        Self {
            clients,
            target,
            config,
        }
    }

    /// Resolve the caller's account and build the target from `config`.
    pub async fn connect(clients: CloudClients, config: DeployConfig) -> Result<Self> {
        let region = config.region.clone().ok_or_else(|| {
            DeployError::Config("no region configured; pass --region or set AWS_REGION".to_string())
        })?;
        let account = clients.identity.caller_account().await?;
        let target = DeploymentTarget::new(config.agent_name.as_str(), region, account)?;
        Ok(Self::new(clients, target, config))
    }

    pub fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Run every deployment step inside the deployment span.
    pub async fn deploy(&self) -> Result<DeploymentOutcome> {
        let span = deploy_span(self.target.name(), self.target.region());
        self.steps().instrument(span).await
    }

    /// repository → image → execution role → runtime → ready.
    pub async fn steps(&self) -> Result<DeploymentOutcome> {
        info!(
            agent = %self.target.name(),
            account = %self.target.account_id(),
            strategy = %self.config.strategy,
            "deploying agent"
        );

        let repository = ensure_repository(
            self.clients.registry.as_ref(),
            &self.target.repository_name(),
        )
        .await?
        .into_inner();

        let image =
            build_and_push(&self.clients, &self.target, &repository.uri, &self.config).await?;

        let role = ensure_role(
            self.clients.identity.as_ref(),
            &RoleSpec::execution(self.target.role_name()),
            self.config.role_propagation_delay(),
        )
        .await?
        .into_inner();

        let runtime = create_or_update_runtime(
            self.clients.control.as_ref(),
            self.target.name(),
            &image,
            &role.arn,
            &self.config.network_mode,
        )
        .await?;

        let status = wait_for_ready(
            self.clients.control.as_ref(),
            &runtime.agent_id,
            self.config.ready_wait(),
        )
        .await?;
        info!(agent_arn = %runtime.agent_arn, "deployment successful");

        Ok(DeploymentOutcome {
            target: self.target.clone(),
            repository_uri: repository.uri,
            image,
            identity: ExecutionIdentity {
                role_name: role.name,
                role_arn: role.arn,
            },
            runtime,
            status,
        })
    }

    pub async fn invoke(
        &self,
        agent_arn: &str,
        prompt: &str,
        session: Option<&SessionId>,
    ) -> Result<Value> {
        invoke(self.clients.data.as_ref(), agent_arn, prompt, session).await
    }

    pub async fn status(&self, agent_id: &str) -> Result<RuntimeDescription> {
        Ok(self.clients.control.get_runtime(agent_id).await?)
    }

    /// Tear down the runtime, repository and execution role of this target.
    pub async fn cleanup(&self, agent_id: &str) -> CleanupReport {
        cleanup(
            self.clients.control.as_ref(),
            self.clients.registry.as_ref(),
            self.clients.identity.as_ref(),
            agent_id,
            &self.target.repository_name(),
            &self.target.role_name(),
        )
        .await
    }
}
