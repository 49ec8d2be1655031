use agentcore_agent::{serve, AgentConfig};
use anyhow::Context;
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json = std::env::var("AGENT_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    agentcore_core::init_tracing(json, Level::INFO);

    let config = AgentConfig::from_env().context("reading agent configuration")?;
    if config.api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; invocations will fail");
    }
    serve(config).await.context("serving agent")
}
