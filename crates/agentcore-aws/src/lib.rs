//! AWS backend for the deployment core
//!
//! Implements every trait in `agentcore_core::cloud` by driving the `aws`
//! command-line interface:
//!
//! - `EcrRegistry`: repositories and registry login
//! - `IamIdentity`: caller account and roles
//! - `S3Store`: source bucket and uploads
//! - `CodeBuildService`: remote image builds
//! - `AgentCoreControl` / `AgentCoreData`: runtimes, invocations and sessions

pub mod agentcore;
pub mod cli;
pub mod codebuild;
pub mod ecr;
pub mod iam;
pub mod region;
pub mod s3;

use std::sync::Arc;

use agentcore_core::build::ImageEngine;
use agentcore_core::CloudClients;

pub use agentcore::{AgentCoreControl, AgentCoreData};
pub use cli::{classify, AwsCli};
pub use codebuild::CodeBuildService;
pub use ecr::EcrRegistry;
pub use iam::IamIdentity;
pub use region::{pick_region, resolve_region, RegionSources, FALLBACK_REGION};
pub use s3::S3Store;

/// All service clients for one region.
#[derive(Debug, Clone)]
pub struct AwsBackend {
    cli: AwsCli,
}

impl AwsBackend {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            cli: AwsCli::new(region),
        }
    }

    pub fn with_cli(cli: AwsCli) -> Self {
        Self { cli }
    }

    pub fn region(&self) -> &str {
        self.cli.region()
    }

    /// Bundle the service clients with `engine` for local image builds.
    pub fn clients(&self, engine: Arc<dyn ImageEngine>) -> CloudClients {
        CloudClients {
            registry: Arc::new(EcrRegistry::new(self.cli.clone())),
            identity: Arc::new(IamIdentity::new(self.cli.clone())),
            storage: Arc::new(S3Store::new(self.cli.clone())),
            builds: Arc::new(CodeBuildService::new(self.cli.clone())),
            control: Arc::new(AgentCoreControl::new(self.cli.clone())),
            data: Arc::new(AgentCoreData::new(self.cli.clone())),
            image_engine: engine,
        }
    }
}
