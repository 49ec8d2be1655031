//! Local image builds through a container engine.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::cloud::{ContainerRegistry, RegistryCredentials};
use crate::domain::{ImageReference, Result};
use crate::process::{run_command, CommandSpec};

/// Builds and pushes container images.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    async fn login(&self, credentials: &RegistryCredentials) -> Result<()>;

    async fn build(
        &self,
        image: &ImageReference,
        context: &Path,
        platform: Option<&str>,
    ) -> Result<()>;

    async fn push(&self, image: &ImageReference) -> Result<()>;
}

/// [`ImageEngine`] backed by the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: std::env::var("AGENTCORE_DOCKER").unwrap_or_else(|_| "docker".to_string()),
        }
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ImageEngine for DockerCli {
    async fn login(&self, credentials: &RegistryCredentials) -> Result<()> {
        let spec = CommandSpec::new(&self.program)
            .args(["login", "--username", credentials.username.as_str(), "--password-stdin"])
            .arg(credentials.endpoint.as_str())
            .with_stdin(credentials.password.as_bytes().to_vec());
        run_command(&spec).await?.ensure_success("docker login")?;
        Ok(())
    }

    async fn build(
        &self,
        image: &ImageReference,
        context: &Path,
        platform: Option<&str>,
    ) -> Result<()> {
        let mut spec = CommandSpec::new(&self.program).arg("build");
        if let Some(platform) = platform {
            spec = spec.args(["--platform", platform]);
        }
        let spec = spec
            .args(["-t".to_string(), image.to_string()])
            .arg(context.to_string_lossy())
            .inherit_output();
        run_command(&spec).await?.ensure_success("docker build")?;
        Ok(())
    }

    async fn push(&self, image: &ImageReference) -> Result<()> {
        let spec = CommandSpec::new(&self.program)
            .arg("push")
            .arg(image.to_string())
            .inherit_output();
        run_command(&spec).await?.ensure_success("docker push")?;
        Ok(())
    }
}

/// Log in, build and push `image` from `context`.
pub async fn build_and_push_local(
    registry: &dyn ContainerRegistry,
    engine: &dyn ImageEngine,
    image: ImageReference,
    context: &Path,
    platform: Option<&str>,
) -> Result<ImageReference> {
    info!(endpoint = %image.registry_host(), "authenticating with registry");
    let credentials = registry.login_credentials().await?;
    engine.login(&credentials).await?;

    info!(image = %image, "building image");
    engine.build(&image, context, platform).await?;

    info!(image = %image, "pushing image");
    engine.push(&image).await?;
    Ok(image)
}
