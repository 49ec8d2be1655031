//! HTTP surface of the runtime container: `GET /ping` and `POST /invocations`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use agentcore_core::{extract_prompt, ResponseEnvelope, DEFAULT_SESSION_ID};

use crate::assistant::{Assistant, InvocationContext};
use crate::connection::ConnectionManager;
use crate::error::InvocationError;

pub const SESSION_HEADER: &str = "x-amzn-bedrock-agentcore-runtime-session-id";

pub struct AppState {
    pub assistant: Arc<dyn Assistant>,
    pub connection: Arc<ConnectionManager>,
    /// Unix seconds of the last completed invocation (or of startup)
    last_update: AtomicI64,
}

impl AppState {
    pub fn new(assistant: Arc<dyn Assistant>, connection: Arc<ConnectionManager>) -> Self {
        Self {
            assistant,
            connection,
            last_update: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    fn touch(&self) {
        self.last_update
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/invocations", post(invocations))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct PingResponse {
    status: &'static str,
    time_of_last_update: i64,
}

async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "Healthy",
        time_of_last_update: state.last_update.load(Ordering::Relaxed),
    })
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_SESSION_ID)
        .to_string()
}

/// Always answers 200; failures travel in the envelope.
async fn invocations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ResponseEnvelope> {
    let ctx = InvocationContext {
        session_id: session_id(&headers),
        request_timestamp: Utc::now(),
        connection: state.connection.clone(),
    };
    info!(session_id = %ctx.session_id, "invocation started");

    let envelope = match handle(state.assistant.as_ref(), &ctx, &body).await {
        Ok(text) => {
            info!(session_id = %ctx.session_id, "invocation completed");
            ResponseEnvelope::success(text, ctx.request_timestamp, Utc::now())
        }
        Err(err) => {
            warn!(session_id = %ctx.session_id, kind = err.kind(), error = %err, "invocation failed");
            err.into_envelope(ctx.request_timestamp)
        }
    };
    state.touch();
    Json(envelope)
}

async fn handle(
    assistant: &dyn Assistant,
    ctx: &InvocationContext,
    body: &[u8],
) -> Result<String, InvocationError> {
    let payload: serde_json::Value = serde_json::from_slice(body)?;
    let prompt = extract_prompt(&payload)?;
    assistant.respond(ctx, &prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_header_defaults() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id(&headers), "default");
        headers.insert(SESSION_HEADER, HeaderValue::from_static(""));
        assert_eq!(session_id(&headers), "default");
        headers.insert(
            SESSION_HEADER,
            HeaderValue::from_static("Mixed-Case-Session-Id-0123456789abcdef"),
        );
        assert_eq!(session_id(&headers), "Mixed-Case-Session-Id-0123456789abcdef");
    }
}
