//! Conversational agent served on the AgentCore runtime contract
//!
//! `POST /invocations` takes `{"prompt": ...}` (or `{"input": {"prompt": ...}}`),
//! forwards it to the assistant API and answers with the `{"output": ...}`
//! envelope. `GET /ping` reports health.

pub mod app;
pub mod assistant;
pub mod config;
pub mod connection;
pub mod error;

use std::sync::Arc;

use tracing::info;

pub use app::{router, AppState, SESSION_HEADER};
pub use assistant::{AnthropicAssistant, Assistant, InvocationContext, SseText, SYSTEM_PROMPT};
pub use config::AgentConfig;
pub use connection::ConnectionManager;
pub use error::{ConfigError, InvocationError};

/// Bind and serve until the process is stopped.
pub async fn serve(config: AgentConfig) -> anyhow::Result<()> {
    let connection = Arc::new(ConnectionManager::new(config.connection_max_age));
    let assistant: Arc<dyn Assistant> = Arc::new(AnthropicAssistant::new(&config));
    let state = Arc::new(AppState::new(assistant, connection));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, model = %config.model, "agent listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
