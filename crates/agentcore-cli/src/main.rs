//! AgentCore - deploy and exercise conversational agents
//!
//! The `agentcore` command drives an agent through its lifecycle on Bedrock
//! AgentCore Runtime.
//!
//! ## Commands
//!
//! - `deploy`: provision, build and push the image, bind the runtime
//! - `cleanup`: delete the runtime, repository and execution role
//! - `status`: show a runtime's current status
//! - `invoke`: send one prompt to a deployed runtime
//! - `session-test`: run the session isolation scenarios
//! - `patch-dockerfile`: add the assistant settings block to a Dockerfile

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use agentcore_aws::{resolve_region, AwsBackend};
use agentcore_core::cloud::RuntimeControl;
use agentcore_core::dockerfile::{patch_file, Anchor};
use agentcore_core::harness::ScenarioReport;
use agentcore_core::{
    BuildStrategy, CleanupReport, CloudClients, CloudError, DeployConfig, DeployError, Deployer,
    DeploymentOutcome, DockerCli, PatchOutcome, RuntimeTester, SessionId, ASSISTANT_PATCH,
};

/// Prompt sent right after a deployment unless `--no-invoke` is given.
const SMOKE_PROMPT: &str = "Hello, how are you?";

#[derive(Parser)]
#[command(name = "agentcore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy and exercise conversational agents on Bedrock AgentCore Runtime", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// AWS region (falls back to AWS_REGION, AWS_DEFAULT_REGION, the CLI profile, then us-east-1)
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, push and deploy the agent, then send it a test prompt
    Deploy {
        /// Agent name (default: AGENTCORE_AGENT_NAME or conversation_agent_rust)
        #[arg(long)]
        name: Option<String>,

        /// Build the image remotely with CodeBuild instead of local docker
        #[arg(long)]
        codebuild: bool,

        /// Image tag
        #[arg(long)]
        tag: Option<String>,

        /// Docker build context
        #[arg(long)]
        context: Option<PathBuf>,

        /// Skip the test invocation after deploying
        #[arg(long)]
        no_invoke: bool,
    },

    /// Delete the runtime, its repository and its execution role
    Cleanup {
        /// Agent runtime id
        #[arg(long)]
        agent_id: String,

        /// Agent name the resources were created for
        #[arg(long)]
        name: Option<String>,
    },

    /// Show the status of a runtime
    Status {
        /// Agent runtime id
        #[arg(long)]
        agent_id: String,
    },

    /// Send a prompt to a deployed runtime
    Invoke {
        /// Agent runtime ARN
        #[arg(long)]
        agent_arn: String,

        /// Runtime session id (at least 33 characters)
        #[arg(long)]
        session_id: Option<String>,

        /// Prompt text
        prompt: String,
    },

    /// Exercise session isolation and persistence of a deployed runtime
    SessionTest {
        /// Agent runtime id
        #[arg(long, env = "AGENT_RUNTIME_ID")]
        agent_id: Option<String>,

        /// Run the idle-timeout scenario (waits 15 minutes)
        #[arg(long, conflicts_with = "custom")]
        test_timeout: bool,

        /// Run the quick single-session scenario
        #[arg(long)]
        custom: bool,
    },

    /// Insert the assistant settings block into a Dockerfile
    PatchDockerfile {
        /// Dockerfile to patch
        #[arg(long, default_value = "Dockerfile")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    Standard,
    Timeout,
    Custom,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    agentcore_core::init_tracing(cli.json, level);

    let result = run(cli).await;
    if let Err(err) = &result {
        if let Some(hint) = remediation(err) {
            eprintln!("\n{}", hint);
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    // The only command that needs no cloud access.
    if let Commands::PatchDockerfile { path } = &cli.command {
        return cmd_patch_dockerfile(path).map(|_| ());
    }

    let backend = AwsBackend::new(resolve_region(cli.region).await);
    let clients = backend.clients(Arc::new(DockerCli::default()));
    let region = backend.region().to_string();

    match cli.command {
        Commands::Deploy {
            name,
            codebuild,
            tag,
            context,
            no_invoke,
        } => {
            let config = deploy_config(&region, name, codebuild, tag, context)?;
            cmd_deploy(clients, config, !no_invoke).await.map(|_| ())
        }
        Commands::Cleanup { agent_id, name } => {
            let config = deploy_config(&region, name, false, None, None)?;
            cmd_cleanup(clients, config, &agent_id).await.map(|_| ())
        }
        Commands::Status { agent_id } => cmd_status(&clients, &agent_id).await,
        Commands::Invoke {
            agent_arn,
            session_id,
            prompt,
        } => cmd_invoke(&clients, &agent_arn, session_id, &prompt).await,
        Commands::SessionTest {
            agent_id,
            test_timeout,
            custom,
        } => {
            let scenario = match (test_timeout, custom) {
                (true, _) => Scenario::Timeout,
                (_, true) => Scenario::Custom,
                _ => Scenario::Standard,
            };
            cmd_session_test(&clients, agent_id.as_deref(), scenario)
                .await
                .map(|_| ())
        }
        Commands::PatchDockerfile { path } => cmd_patch_dockerfile(&path).map(|_| ()),
    }
}

fn deploy_config(
    region: &str,
    name: Option<String>,
    codebuild: bool,
    tag: Option<String>,
    context: Option<PathBuf>,
) -> Result<DeployConfig> {
    let mut config = DeployConfig::from_env()?.with_region(region);
    if let Some(name) = name {
        config = config.with_agent_name(&name);
    }
    if codebuild {
        config = config.with_strategy(BuildStrategy::Remote);
    }
    if let Some(tag) = tag {
        config = config.with_image_tag(&tag);
    }
    if let Some(context) = context {
        config = config.with_context_dir(context);
    }
    Ok(config)
}

/// Guidance for errors a user can fix in their environment.
fn remediation(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DeployError>())
        .and_then(|deploy| match deploy {
            DeployError::Config(_) => Some(
                "Check your configuration:\n  \
                 - pass --region or set AWS_REGION\n  \
                 - pass --agent-id or set AGENT_RUNTIME_ID for runtime commands\n  \
                 - pass --name or set AGENTCORE_AGENT_NAME to pick the agent\n  \
                 - AGENTCORE_BUILD_STRATEGY must be local or remote",
            ),
            DeployError::Cloud(CloudError::Command(_)) => Some(
                "The aws CLI could not run. Install it and configure credentials with \
                 `aws configure` (or set AWS_PROFILE).",
            ),
            DeployError::Subprocess(_) => Some(
                "A docker command failed. Make sure docker is running, or deploy with --codebuild.",
            ),
            _ => None,
        })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Deploy the agent and optionally send it a test prompt
async fn cmd_deploy(
    clients: CloudClients,
    config: DeployConfig,
    invoke_after: bool,
) -> Result<DeploymentOutcome> {
    let deployer = Deployer::connect(clients, config)
        .await
        .context("Failed to resolve the deployment target")?;
    let outcome = deployer.deploy().await.context("Deployment failed")?;

    println!("Deployment successful");
    println!("  Agent name:    {}", outcome.target.name());
    println!("  Region:        {}", outcome.target.region());
    println!("  Image:         {}", outcome.image);
    println!("  Role:          {}", outcome.identity.role_arn);
    println!("  Agent id:      {}", outcome.runtime.agent_id);
    println!("  Agent ARN:     {}", outcome.runtime.agent_arn);
    println!("  Status:        {}", outcome.status);

    if invoke_after {
        println!("\nTest invocation:");
        let response = deployer
            .invoke(&outcome.runtime.agent_arn, SMOKE_PROMPT, None)
            .await
            .context("Test invocation failed")?;
        println!("Response: {}", serde_json::to_string_pretty(&response)?);
    }
    Ok(outcome)
}

/// Tear down everything a deployment created; failures are reported, not fatal
async fn cmd_cleanup(
    clients: CloudClients,
    config: DeployConfig,
    agent_id: &str,
) -> Result<CleanupReport> {
    let deployer = Deployer::connect(clients, config)
        .await
        .context("Failed to resolve the deployment target")?;
    let report = deployer.cleanup(agent_id).await;

    for step in &report.steps {
        match &step.error {
            None => println!("  deleted  {}", step.resource),
            Some(e) => println!("  FAILED   {}: {}", step.resource, e),
        }
    }
    if report.is_clean() {
        println!("Cleanup complete");
    } else {
        println!(
            "Cleanup finished with {} failure(s)",
            report.failures().count()
        );
    }
    Ok(report)
}

async fn cmd_status(clients: &CloudClients, agent_id: &str) -> Result<()> {
    let runtime = clients
        .control
        .get_runtime(agent_id)
        .await
        .map_err(DeployError::from)
        .context(format!("Failed to describe runtime {}", agent_id))?;
    println!("Agent id:  {}", runtime.id);
    println!("Agent ARN: {}", runtime.arn);
    println!("Status:    {}", runtime.status);
    Ok(())
}

async fn cmd_invoke(
    clients: &CloudClients,
    agent_arn: &str,
    session_id: Option<String>,
    prompt: &str,
) -> Result<()> {
    let session = session_id
        .map(SessionId::try_from)
        .transpose()
        .map_err(DeployError::from)?;
    let response =
        agentcore_core::invoke::invoke(clients.data.as_ref(), agent_arn, prompt, session.as_ref())
            .await
            .context("Invocation failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_session_test(
    clients: &CloudClients,
    agent_id: Option<&str>,
    scenario: Scenario,
) -> Result<ScenarioReport> {
    let Some(agent_id) = agent_id else {
        return Err(DeployError::Config(
            "no agent runtime id; pass --agent-id or set AGENT_RUNTIME_ID".to_string(),
        )
        .into());
    };
    let tester = RuntimeTester::connect(clients.control.as_ref(), clients.data.clone(), agent_id)
        .await
        .context(format!("Failed to resolve runtime {}", agent_id))?;
    println!("Agent ARN: {}", tester.agent_arn());

    let report = match scenario {
        Scenario::Standard => tester.run_standard().await,
        Scenario::Timeout => tester.run_timeout().await,
        Scenario::Custom => tester.run_custom().await,
    };
    print_scenario(&report);

    if !report.succeeded() {
        bail!("session test '{}' failed", report.scenario);
    }
    Ok(report)
}

fn print_scenario(report: &ScenarioReport) {
    println!("\nScenario: {}", report.scenario);
    for (i, step) in report.steps.iter().enumerate() {
        println!("\n[{}] {} (session {})", i + 1, step.label, step.session_id);
        if let Some(text) = &step.response_text {
            println!("    response: {}", text);
        }
        if let Some(error) = &step.error {
            println!("    error: {}", error);
        }
        match (step.recalled, step.as_expected()) {
            (Some(recalled), Some(ok)) => println!(
                "    recalled: {} ({})",
                recalled,
                if ok { "as expected" } else { "UNEXPECTED" }
            ),
            (Some(recalled), None) => println!("    recalled: {}", recalled),
            _ => {}
        }
    }
    if let Some(stop) = &report.stop {
        println!(
            "\nStopped session {} (status {})",
            stop.session_id.as_deref().unwrap_or("?"),
            stop.status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
    }
}

fn cmd_patch_dockerfile(path: &Path) -> Result<PatchOutcome> {
    let outcome = patch_file(path, &ASSISTANT_PATCH)
        .with_context(|| format!("Failed to patch {}", path.display()))?;
    match &outcome {
        PatchOutcome::AlreadyPresent => {
            println!("{} already contains the assistant settings", path.display())
        }
        PatchOutcome::Applied(anchor) => {
            let place = match anchor {
                Anchor::RegionEnv => "after the AWS_REGION ENV block",
                Anchor::Workdir => "after WORKDIR",
                Anchor::End => "at the end",
            };
            info!(path = %path.display(), "dockerfile patched");
            println!("Patched {} {}", path.display(), place);
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_core::fakes::{FakeCloud, MemoryRuntimeControl, FAKE_ACCOUNT};
    use agentcore_core::RuntimeStatus;
    use clap::CommandFactory;

    fn local_config() -> DeployConfig {
        DeployConfig::default()
            .with_agent_name("demo")
            .with_region("us-east-1")
            .with_strategy(BuildStrategy::Local)
            .with_timings(10, 3600, 600, 0)
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_flags_parse() {
        let cli = Cli::try_parse_from([
            "agentcore", "--region", "eu-west-1", "deploy", "--name", "demo", "--codebuild",
            "--tag", "v2", "--no-invoke",
        ])
        .unwrap();
        assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
        match cli.command {
            Commands::Deploy {
                name,
                codebuild,
                tag,
                no_invoke,
                ..
            } => {
                let config = deploy_config("eu-west-1", name, codebuild, tag, None).unwrap();
                assert_eq!(config.agent_name, "demo");
                assert_eq!(config.strategy, BuildStrategy::Remote);
                assert_eq!(config.image_tag, "v2");
                assert!(no_invoke);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_session_test_scenarios_conflict() {
        assert!(Cli::try_parse_from(["agentcore", "session-test", "--test-timeout", "--custom"]).is_err());
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["agentcore", "session-test", "--bogus"]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_then_cleanup() {
        let cloud = FakeCloud::new().with_control(MemoryRuntimeControl::with_statuses([
            RuntimeStatus::Creating,
            RuntimeStatus::Ready,
        ]));
        let outcome = cmd_deploy(cloud.clients(), local_config(), true)
            .await
            .expect("deploy");
        assert_eq!(outcome.target.account_id(), FAKE_ACCOUNT);
        assert_eq!(cloud.data.invocations().len(), 1);

        let report = cmd_cleanup(cloud.clients(), local_config(), &outcome.runtime.agent_id)
            .await
            .expect("cleanup");
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_session_test_without_agent_id_has_guidance() {
        let cloud = FakeCloud::new();
        let err = cmd_session_test(&cloud.clients(), None, Scenario::Custom)
            .await
            .unwrap_err();
        assert!(remediation(&err).is_some_and(|h| h.contains("AGENT_RUNTIME_ID")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_test_failure_is_error() {
        let cloud = FakeCloud::new();
        let outcome = cmd_deploy(cloud.clients(), local_config(), false)
            .await
            .expect("deploy");
        cloud.data.set_failing(true);
        let result =
            cmd_session_test(&cloud.clients(), Some(&outcome.runtime.agent_id), Scenario::Custom)
                .await;
        assert!(result.is_err());
        assert!(remediation(result.as_ref().unwrap_err()).is_none());
    }

    #[test]
    fn test_patch_dockerfile_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "FROM rust:1\nWORKDIR /app\nCOPY . .\n").unwrap();

        let first = cmd_patch_dockerfile(&path).unwrap();
        assert_eq!(first, PatchOutcome::Applied(Anchor::Workdir));
        let once = std::fs::read_to_string(&path).unwrap();

        assert_eq!(cmd_patch_dockerfile(&path).unwrap(), PatchOutcome::AlreadyPresent);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), once);
    }
}
