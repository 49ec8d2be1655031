//! Create-or-update of the agent runtime, and waiting for it to be ready.

use std::time::Instant;

use tracing::{info, warn};

use crate::cloud::{RuntimeControl, RuntimeSpec};
use crate::domain::{DeployError, ImageReference, Result, RuntimeInstance, RuntimeStatus};
use crate::obs;
use crate::waiter::{wait_for_terminal, WaitPolicy};

/// Bind runtime `name` to `image` and `role_arn`, creating it or updating
/// the existing one. Both paths yield the same [`RuntimeInstance`] shape.
pub async fn create_or_update_runtime(
    control: &dyn RuntimeControl,
    name: &str,
    image: &ImageReference,
    role_arn: &str,
    network_mode: &str,
) -> Result<RuntimeInstance> {
    let start = Instant::now();
    obs::emit_step_started("runtime", name);

    let spec = RuntimeSpec {
        name: name.to_string(),
        container_uri: image.to_string(),
        role_arn: role_arn.to_string(),
        network_mode: network_mode.to_string(),
    };

    let (handle, created) = match control.create_runtime(&spec).await {
        Ok(handle) => (handle, true),
        Err(e) if e.is_conflict() || e.is_already_exists() => {
            info!(name = %name, "runtime exists, updating");
            let id = resolve_runtime_id(control, name).await?;
            (control.update_runtime(&id, &spec).await?, false)
        }
        Err(e) => return Err(e.into()),
    };

    obs::emit_step_finished("runtime", name, created, start.elapsed().as_millis() as u64);
    info!(agent_id = %handle.id, agent_arn = %handle.arn, created, "runtime bound");
    Ok(RuntimeInstance {
        agent_id: handle.id,
        agent_arn: handle.arn,
        image: image.clone(),
        role_arn: role_arn.to_string(),
    })
}

/// Find the id of the runtime called `name`.
pub async fn resolve_runtime_id(control: &dyn RuntimeControl, name: &str) -> Result<String> {
    control
        .list_runtimes()
        .await?
        .into_iter()
        .find(|summary| summary.name == name)
        .map(|summary| summary.id)
        .ok_or_else(|| DeployError::NotFound {
            kind: "runtime".to_string(),
            name: name.to_string(),
        })
}

/// Poll the runtime until it is ready.
///
/// Any other terminal status is a `RuntimeFailed` error.
pub async fn wait_for_ready(
    control: &dyn RuntimeControl,
    agent_id: &str,
    policy: WaitPolicy,
) -> Result<RuntimeStatus> {
    let status = wait_for_terminal(
        &format!("runtime {}", agent_id),
        policy,
        &RuntimeStatus::terminal_set(),
        || async move { Ok(control.get_runtime(agent_id).await?.status) },
    )
    .await?;

    if !status.is_ready() {
        warn!(agent_id = %agent_id, status = %status, "runtime did not become ready");
        return Err(DeployError::RuntimeFailed {
            status: status.to_string(),
        });
    }
    Ok(status)
}
