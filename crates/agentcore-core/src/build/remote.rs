//! Remote image builds on the managed build service.

use tracing::info;

use crate::build::bundle::SourceBundle;
use crate::cloud::{BuildEnvironment, BuildProjectSpec, CloudClients, RoleSpec};
use crate::config::DeployConfig;
use crate::domain::{BuildStatus, DeployError, DeploymentTarget, ImageReference, Result};
use crate::provision::{ensure_bucket, ensure_build_project, ensure_role};
use crate::waiter::wait_for_terminal;

/// Build specification with login, build and push phases for `image`.
pub fn render_buildspec(region: &str, image: &ImageReference) -> String {
    format!(
        "version: 0.2
phases:
  pre_build:
    commands:
      - echo Logging in to Amazon ECR...
      - aws ecr get-login-password --region {region} | docker login --username AWS --password-stdin {host}
  build:
    commands:
      - echo Building Docker image...
      - docker build -t {image} .
  post_build:
    commands:
      - echo Pushing Docker image...
      - docker push {image}
",
        region = region,
        host = image.registry_host(),
        image = image,
    )
}

/// Package the build context, run it on the build service and wait for it.
///
/// The temporary directory holding the archive is removed as soon as the
/// build has started, or failed to start.
pub async fn build_and_push_remote(
    clients: &CloudClients,
    target: &DeploymentTarget,
    image: ImageReference,
    config: &DeployConfig,
) -> Result<ImageReference> {
    let bucket = target.source_bucket();
    let key = target.source_key();
    ensure_bucket(clients.storage.as_ref(), &bucket, target.region()).await?;

    let workdir = tempfile::tempdir()?;
    let buildspec = render_buildspec(target.region(), &image);
    let bundle = SourceBundle::package(
        &config.context_dir,
        &config.bundle_files,
        &buildspec,
        &workdir.path().join("source.zip"),
    )?;
    info!(
        bucket = %bucket,
        key = %key,
        digest = %bundle.digest,
        entries = bundle.entries.len(),
        "uploading source bundle"
    );
    clients.storage.upload_file(&bucket, &key, &bundle.path).await?;

    let role = ensure_role(
        clients.identity.as_ref(),
        &RoleSpec::build_service(target.build_role_name()),
        config.role_propagation_delay(),
    )
    .await?
    .into_inner();

    let project = BuildProjectSpec {
        name: target.build_project_name(),
        source_location: format!("{}/{}", bucket, key),
        service_role_arn: role.arn,
        environment: BuildEnvironment::default(),
    };
    ensure_build_project(clients.builds.as_ref(), &project).await?;

    let started = clients.builds.start_build(&project.name).await;
    drop(workdir);
    let build_id = started?;
    info!(build_id = %build_id, "build started");

    let builds = clients.builds.as_ref();
    let id = build_id.as_str();
    let status = wait_for_terminal(
        &format!("build {}", build_id),
        config.build_wait(),
        &BuildStatus::terminal_set(),
        || async move { Ok(builds.build_status(id).await?) },
    )
    .await?;

    if status.is_failure() {
        return Err(DeployError::BuildFailed {
            status: status.to_string(),
        });
    }
    info!(image = %image, "remote build succeeded");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buildspec_phases() {
        let image = ImageReference::new(
            "123456789012.dkr.ecr.us-west-2.amazonaws.com/agentcore/demo",
            "latest",
        );
        let spec = render_buildspec("us-west-2", &image);
        assert!(spec.starts_with("version: 0.2\n"));
        assert!(spec.contains("pre_build:"));
        assert!(spec.contains("--region us-west-2"));
        assert!(spec.contains(
            "--password-stdin 123456789012.dkr.ecr.us-west-2.amazonaws.com\n"
        ));
        assert!(spec.contains(
            "docker build -t 123456789012.dkr.ecr.us-west-2.amazonaws.com/agentcore/demo:latest ."
        ));
        assert!(spec.contains(
            "docker push 123456789012.dkr.ecr.us-west-2.amazonaws.com/agentcore/demo:latest"
        ));
    }
}
