//! Container registry over `aws ecr`.

use async_trait::async_trait;
use serde::Deserialize;

use agentcore_core::cloud::{ContainerRegistry, RegistryCredentials, RepositoryDescriptor};
use agentcore_core::{CloudError, CloudResult};

use crate::cli::{args, AwsCli};

/// Username the registry expects alongside a login password.
const REGISTRY_USER: &str = "AWS";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    repository_name: String,
    repository_uri: String,
}

impl From<Repository> for RepositoryDescriptor {
    fn from(repo: Repository) -> Self {
        Self {
            name: repo.repository_name,
            uri: repo.repository_uri,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateRepositoryResponse {
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct DescribeRepositoriesResponse {
    #[serde(default)]
    repositories: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationData {
    proxy_endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationTokenResponse {
    #[serde(default)]
    authorization_data: Vec<AuthorizationData>,
}

#[derive(Debug, Clone)]
pub struct EcrRegistry {
    cli: AwsCli,
}

impl EcrRegistry {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl ContainerRegistry for EcrRegistry {
    async fn create_repository(
        &self,
        name: &str,
        scan_on_push: bool,
    ) -> CloudResult<RepositoryDescriptor> {
        let scan = format!("scanOnPush={}", scan_on_push);
        let resp: CreateRepositoryResponse = self
            .cli
            .call(&args([
                "ecr",
                "create-repository",
                "--repository-name",
                name,
                "--image-scanning-configuration",
                scan.as_str(),
            ]))
            .await?;
        Ok(resp.repository.into())
    }

    async fn describe_repository(&self, name: &str) -> CloudResult<RepositoryDescriptor> {
        let resp: DescribeRepositoriesResponse = self
            .cli
            .call(&args([
                "ecr",
                "describe-repositories",
                "--repository-names",
                name,
            ]))
            .await?;
        resp.repositories
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| CloudError::NotFound {
                resource: "repository".to_string(),
                name: name.to_string(),
            })
    }

    async fn login_credentials(&self) -> CloudResult<RegistryCredentials> {
        let token: AuthorizationTokenResponse = self
            .cli
            .call(&args(["ecr", "get-authorization-token"]))
            .await?;
        let endpoint = token
            .authorization_data
            .into_iter()
            .next()
            .map(|d| d.proxy_endpoint)
            .ok_or_else(|| CloudError::Decode("no authorization data returned".to_string()))?;
        let password = self
            .cli
            .text(&args(["ecr", "get-login-password"]))
            .await?
            .trim()
            .to_string();
        Ok(RegistryCredentials {
            endpoint,
            username: REGISTRY_USER.to_string(),
            password,
        })
    }

    async fn delete_repository(&self, name: &str, force: bool) -> CloudResult<()> {
        let mut argv = args(["ecr", "delete-repository", "--repository-name", name]);
        if force {
            argv.push("--force".to_string());
        }
        self.cli.json(&argv).await.map(|_| ())
    }
}
