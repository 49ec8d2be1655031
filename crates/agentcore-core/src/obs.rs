//! Structured lifecycle events for deployments.
//!
//! Every step of a deployment emits `deploy.step_started` and
//! `deploy.step_finished`; waiters emit `wait.polled`; cleanup failures
//! emit `cleanup.failed` at warn level. Deployments run inside the span
//! returned by [`deploy_span`].

use tracing::{info, warn};

/// Deployment-scoped span.
///
/// ```ignore
/// deployer.steps().instrument(deploy_span("my_agent", "us-west-2")).await
/// ```
pub fn deploy_span(agent_name: &str, region: &str) -> tracing::Span {
    tracing::info_span!("agentcore.deploy", agent_name = %agent_name, region = %region)
}

pub fn emit_step_started(step: &str, resource: &str) {
    info!(event = "deploy.step_started", step = %step, resource = %resource);
}

pub fn emit_step_finished(step: &str, resource: &str, created: bool, duration_ms: u64) {
    info!(
        event = "deploy.step_finished",
        step = %step,
        resource = %resource,
        created = created,
        duration_ms = duration_ms,
    );
}

/// One poll of a lifecycle waiter.
pub fn emit_wait_polled(resource: &str, status: &str, elapsed_secs: u64) {
    info!(
        event = "wait.polled",
        resource = %resource,
        status = %status,
        elapsed_secs = elapsed_secs,
    );
}

/// A cleanup step failed; cleanup carries on.
pub fn emit_cleanup_failed(resource: &str, error: &dyn std::fmt::Display) {
    warn!(event = "cleanup.failed", resource = %resource, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_emit_step_events() {
        let _span = deploy_span("demo", "us-east-1").entered();
        emit_step_started("repository", "agentcore/demo");
        emit_step_finished("repository", "agentcore/demo", true, 12);
        assert!(logs_contain("deploy.step_started"));
        assert!(logs_contain("deploy.step_finished"));
    }

    #[traced_test]
    #[test]
    fn test_cleanup_failed_is_warn() {
        emit_cleanup_failed("runtime rt-1", &"access denied");
        assert!(logs_contain("WARN"));
        assert!(logs_contain("cleanup.failed"));
    }
}
