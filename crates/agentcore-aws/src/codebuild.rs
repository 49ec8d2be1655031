//! Managed builds over `aws codebuild`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use agentcore_core::cloud::{BuildProjectSpec, BuildService};
use agentcore_core::{BuildStatus, CloudError, CloudResult};

use crate::cli::{args, AwsCli};

/// Request body shared by `create-project` and `update-project`.
fn project_input(spec: &BuildProjectSpec) -> Value {
    json!({
        "name": spec.name,
        "source": {"type": "S3", "location": spec.source_location},
        "artifacts": {"type": "NO_ARTIFACTS"},
        "environment": spec.environment,
        "serviceRole": spec.service_role_arn,
    })
}

#[derive(Debug, Deserialize)]
struct BuildRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StartBuildResponse {
    build: BuildRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildDetail {
    build_status: String,
}

#[derive(Debug, Deserialize)]
struct BatchGetBuildsResponse {
    #[serde(default)]
    builds: Vec<BuildDetail>,
}

#[derive(Debug, Clone)]
pub struct CodeBuildService {
    cli: AwsCli,
}

impl CodeBuildService {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }

    async fn put_project(&self, operation: &str, spec: &BuildProjectSpec) -> CloudResult<()> {
        let input = project_input(spec).to_string();
        self.cli
            .json(&args(["codebuild", operation, "--cli-input-json", input.as_str()]))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl BuildService for CodeBuildService {
    async fn create_project(&self, spec: &BuildProjectSpec) -> CloudResult<()> {
        self.put_project("create-project", spec).await
    }

    async fn update_project(&self, spec: &BuildProjectSpec) -> CloudResult<()> {
        self.put_project("update-project", spec).await
    }

    async fn start_build(&self, project: &str) -> CloudResult<String> {
        let resp: StartBuildResponse = self
            .cli
            .call(&args(["codebuild", "start-build", "--project-name", project]))
            .await?;
        Ok(resp.build.id)
    }

    async fn build_status(&self, build_id: &str) -> CloudResult<BuildStatus> {
        let resp: BatchGetBuildsResponse = self
            .cli
            .call(&args(["codebuild", "batch-get-builds", "--ids", build_id]))
            .await?;
        resp.builds
            .into_iter()
            .next()
            .map(|b| BuildStatus::parse(&b.build_status))
            .ok_or_else(|| CloudError::NotFound {
                resource: "build".to_string(),
                name: build_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_core::cloud::BuildEnvironment;

    #[test]
    fn test_project_input_shape() {
        let spec = BuildProjectSpec {
            name: "agentcore-build-demo".to_string(),
            source_location: "bucket/demo/source.zip".to_string(),
            service_role_arn: "arn:aws:iam::1:role/CodeBuildRole-demo".to_string(),
            environment: BuildEnvironment::default(),
        };
        let input = project_input(&spec);
        assert_eq!(input["source"]["type"], "S3");
        assert_eq!(input["source"]["location"], "bucket/demo/source.zip");
        assert_eq!(input["artifacts"]["type"], "NO_ARTIFACTS");
        assert_eq!(input["environment"]["type"], "ARM_CONTAINER");
        assert_eq!(input["environment"]["privilegedMode"], true);
        assert_eq!(input["serviceRole"], "arn:aws:iam::1:role/CodeBuildRole-demo");
    }

    #[test]
    fn test_batch_get_builds_status() {
        let body = r#"{"builds": [{"id": "agentcore-build-demo:1", "buildStatus": "IN_PROGRESS"}], "buildsNotFound": []}"#;
        let resp: BatchGetBuildsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            BuildStatus::parse(&resp.builds[0].build_status),
            BuildStatus::InProgress
        );
    }

    #[test]
    fn test_start_build_id() {
        let body = r#"{"build": {"id": "agentcore-build-demo:abc", "buildStatus": "IN_PROGRESS"}}"#;
        let resp: StartBuildResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.build.id, "agentcore-build-demo:abc");
    }
}
