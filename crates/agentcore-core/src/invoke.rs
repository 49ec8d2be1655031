//! Single invocations of a deployed runtime.

use serde_json::{json, Value};
use tracing::debug;

use crate::cloud::{RuntimeData, RuntimeInvocation};
use crate::domain::{DeployError, Result, SessionId};

/// Endpoint qualifier used for every invocation.
pub const DEFAULT_QUALIFIER: &str = "DEFAULT";

/// Send `{"prompt": prompt}` to the runtime and decode the JSON reply.
///
/// The session id, when given, is passed through unmodified.
pub async fn invoke(
    data: &dyn RuntimeData,
    agent_arn: &str,
    prompt: &str,
    session: Option<&SessionId>,
) -> Result<Value> {
    let invocation = RuntimeInvocation {
        agent_arn: agent_arn.to_string(),
        qualifier: DEFAULT_QUALIFIER.to_string(),
        session_id: session.map(|s| s.as_str().to_string()),
        payload: serde_json::to_vec(&json!({ "prompt": prompt }))?,
    };
    debug!(agent_arn = %agent_arn, session = ?invocation.session_id, "invoking runtime");

    let body = data
        .invoke_runtime(&invocation)
        .await
        .map_err(|e| DeployError::Invocation(format!("reading response failed: {}", e)))?;
    decode_body(&body)
}

/// Decode a fully read response body as JSON.
pub fn decode_body(body: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(body)
        .map_err(|e| DeployError::Invocation(format!("response is not utf-8: {}", e)))?;
    serde_json::from_str(text)
        .map_err(|e| DeployError::Invocation(format!("response is not JSON: {}", e)))
}
