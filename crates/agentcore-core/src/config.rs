//! Deployment configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::build::BuildStrategy;
use crate::domain::Result;
use crate::waiter::WaitPolicy;

/// Agent name used when neither a flag nor `AGENTCORE_AGENT_NAME` is given.
pub const DEFAULT_AGENT_NAME: &str = "conversation_agent_rust";

pub const DEFAULT_IMAGE_TAG: &str = "latest";

pub const DEFAULT_NETWORK_MODE: &str = "PUBLIC";

/// Files and directories packaged for a remote build, relative to the context.
pub const DEFAULT_BUNDLE_FILES: &[&str] = &["Dockerfile", "Cargo.toml", "Cargo.lock", "crates"];

/// Settings for one deployment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub agent_name: String,
    /// Unset means "resolve from the environment / cloud CLI"
    pub region: Option<String>,
    pub image_tag: String,
    pub strategy: BuildStrategy,
    /// Docker build context
    pub context_dir: PathBuf,
    pub bundle_files: Vec<PathBuf>,
    /// Passed as `--platform` to local builds
    pub platform: Option<String>,
    pub network_mode: String,
    pub poll_interval_secs: u64,
    pub build_timeout_secs: u64,
    pub ready_timeout_secs: u64,
    pub role_propagation_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        DeployConfig {
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            region: None,
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            strategy: BuildStrategy::default(),
            context_dir: PathBuf::from("."),
            bundle_files: DEFAULT_BUNDLE_FILES.iter().map(PathBuf::from).collect(),
            platform: None,
            network_mode: DEFAULT_NETWORK_MODE.to_string(),
            poll_interval_secs: 10,
            build_timeout_secs: 3600,
            ready_timeout_secs: 600,
            role_propagation_secs: 10,
        }
    }
}

impl DeployConfig {
    /// Defaults overridden by the `AGENTCORE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`DeployConfig::from_env`], reading variables through `lookup`.
    ///
    /// Empty values are ignored. An unknown build strategy is a `Config` error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(name) = get("AGENTCORE_AGENT_NAME") {
            config.agent_name = name;
        }
        if let Some(tag) = get("AGENTCORE_IMAGE_TAG") {
            config.image_tag = tag;
        }
        if let Some(strategy) = get("AGENTCORE_BUILD_STRATEGY") {
            config.strategy = strategy.trim().parse()?;
        }
        config.platform = get("AGENTCORE_DOCKER_PLATFORM");
        Ok(config)
    }

    pub fn with_agent_name(mut self, name: &str) -> Self {
        self.agent_name = name.to_string();
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_image_tag(mut self, tag: &str) -> Self {
        self.image_tag = tag.to_string();
        self
    }

    pub fn with_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = dir.into();
        self
    }

    pub fn with_bundle_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.bundle_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Set every wait-related timing at once. Mostly useful in tests.
    pub fn with_timings(
        mut self,
        poll_interval_secs: u64,
        build_timeout_secs: u64,
        ready_timeout_secs: u64,
        role_propagation_secs: u64,
    ) -> Self {
        self.poll_interval_secs = poll_interval_secs;
        self.build_timeout_secs = build_timeout_secs;
        self.ready_timeout_secs = ready_timeout_secs;
        self.role_propagation_secs = role_propagation_secs;
        self
    }

    pub fn build_wait(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.build_timeout_secs),
        )
    }

    pub fn ready_wait(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.ready_timeout_secs),
        )
    }

    pub fn role_propagation_delay(&self) -> Duration {
        Duration::from_secs(self.role_propagation_secs)
    }
}
