//! Image build strategies.
//!
//! - `Local`: build and push with a container engine on this machine
//! - `Remote`: package the context and build it on the managed build service
//!
//! Both produce the pushed [`ImageReference`].

pub mod bundle;
pub mod local;
pub mod remote;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cloud::CloudClients;
use crate::config::DeployConfig;
use crate::domain::{DeployError, DeploymentTarget, ImageReference, Result};

pub use bundle::SourceBundle;
pub use local::{build_and_push_local, DockerCli, ImageEngine};
pub use remote::{build_and_push_remote, render_buildspec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    #[default]
    Local,
    Remote,
}

impl FromStr for BuildStrategy {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(BuildStrategy::Local),
            "remote" | "codebuild" => Ok(BuildStrategy::Remote),
            other => Err(DeployError::Config(format!(
                "unknown build strategy '{}', expected local or remote",
                other
            ))),
        }
    }
}

impl std::fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStrategy::Local => write!(f, "local"),
            BuildStrategy::Remote => write!(f, "remote"),
        }
    }
}

/// Build `{repository_uri}:{tag}` with the configured strategy.
pub async fn build_and_push(
    clients: &CloudClients,
    target: &DeploymentTarget,
    repository_uri: &str,
    config: &DeployConfig,
) -> Result<ImageReference> {
    let image = ImageReference::new(repository_uri, config.image_tag.as_str());
    match config.strategy {
        BuildStrategy::Local => {
            build_and_push_local(
                clients.registry.as_ref(),
                clients.image_engine.as_ref(),
                image,
                &config.context_dir,
                config.platform.as_deref(),
            )
            .await
        }
        BuildStrategy::Remote => build_and_push_remote(clients, target, image, config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("local".parse::<BuildStrategy>().unwrap(), BuildStrategy::Local);
        assert_eq!("CodeBuild".parse::<BuildStrategy>().unwrap(), BuildStrategy::Remote);
        assert!("kaniko".parse::<BuildStrategy>().is_err());
    }
}
