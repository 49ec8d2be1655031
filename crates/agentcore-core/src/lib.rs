//! AgentCore deployment core
//!
//! Provisioning, image builds, runtime lifecycle, invocation, cleanup and the
//! session test harness for agents hosted on Bedrock AgentCore Runtime. Cloud
//! access goes through the traits in [`cloud`]; [`fakes`] implements them in
//! memory.

pub mod build;
pub mod cleanup;
pub mod cloud;
pub mod config;
pub mod deployer;
pub mod dockerfile;
pub mod domain;
pub mod envelope;
pub mod fakes;
pub mod harness;
pub mod invoke;
pub mod obs;
pub mod process;
pub mod provision;
pub mod runtime;
pub mod telemetry;
pub mod waiter;

pub use build::{build_and_push, BuildStrategy, DockerCli, ImageEngine, SourceBundle};
pub use cleanup::{CleanupReport, CleanupStep};
pub use cloud::{CloudClients, CloudError, CloudResult};
pub use config::DeployConfig;
pub use deployer::{Deployer, DeploymentOutcome};
pub use dockerfile::{DockerfilePatch, PatchError, PatchOutcome, ASSISTANT_PATCH};
pub use domain::{
    BuildStatus, DeployError, DeploymentTarget, ExecutionIdentity, ImageReference, Result,
    RuntimeInstance, RuntimeStatus, SessionId, SessionIdError, DEFAULT_SESSION_ID,
    MIN_SESSION_ID_LEN,
};
pub use envelope::{extract_prompt, PayloadError, ResponseEnvelope, DEFAULT_PROMPT};
pub use harness::{HarnessTimings, RuntimeTester, ScenarioReport, StepReport};
pub use provision::Provisioned;
pub use telemetry::init_tracing;
pub use waiter::{wait_for_terminal, WaitPolicy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
