//! Idempotent creation of cloud resources.
//!
//! Every resource is created first and looked up only when the provider
//! reports that it already exists. Any other provider error is fatal.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cloud::{
    BuildProjectSpec, BuildService, CloudResult, ContainerRegistry, IdentityService,
    ObjectStore, RepositoryDescriptor, RoleDescriptor, RoleSpec,
};
use crate::domain::Result;
use crate::obs;

/// Outcome of [`ensure`]: the resource, and whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned<T> {
    Created(T),
    Existing(T),
}

impl<T> Provisioned<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Provisioned::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Provisioned::Created(v) | Provisioned::Existing(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Provisioned::Created(v) | Provisioned::Existing(v) => v,
        }
    }
}

/// Create a resource, falling back to `lookup` on an "already exists" signal.
pub async fn ensure<T, C, CF, L, LF>(
    kind: &str,
    name: &str,
    create: C,
    lookup: L,
) -> Result<Provisioned<T>>
where
    C: FnOnce() -> CF,
    CF: Future<Output = CloudResult<T>>,
    L: FnOnce() -> LF,
    LF: Future<Output = CloudResult<T>>,
{
    let start = Instant::now();
    obs::emit_step_started(kind, name);

    let outcome = match create().await {
        Ok(created) => Provisioned::Created(created),
        Err(e) if e.is_already_exists() => {
            debug!(kind = %kind, name = %name, "already exists, looking up");
            Provisioned::Existing(lookup().await?)
        }
        Err(e) => return Err(e.into()),
    };

    obs::emit_step_finished(
        kind,
        name,
        outcome.was_created(),
        start.elapsed().as_millis() as u64,
    );
    Ok(outcome)
}

/// Ensure the image repository exists, with scan-on-push enabled.
pub async fn ensure_repository(
    registry: &dyn ContainerRegistry,
    name: &str,
) -> Result<Provisioned<RepositoryDescriptor>> {
    let repo = ensure(
        "repository",
        name,
        || registry.create_repository(name, true),
        || registry.describe_repository(name),
    )
    .await?;
    info!(uri = %repo.get().uri, created = repo.was_created(), "repository ready");
    Ok(repo)
}

/// Ensure a role exists.
///
/// Policies are attached only when the role is newly created, followed by
/// `propagation_delay` so the role is usable by the time it is referenced.
pub async fn ensure_role(
    identity: &dyn IdentityService,
    spec: &RoleSpec,
    propagation_delay: Duration,
) -> Result<Provisioned<RoleDescriptor>> {
    let role = ensure(
        "role",
        &spec.name,
        || identity.create_role(spec),
        || identity.get_role(&spec.name),
    )
    .await?;

    if role.was_created() {
        for policy in &spec.policies {
            identity.attach_role_policy(&spec.name, policy).await?;
            debug!(role = %spec.name, policy = %policy, "attached policy");
        }
        if !propagation_delay.is_zero() {
            info!(
                role = %spec.name,
                delay_secs = propagation_delay.as_secs(),
                "waiting for role propagation"
            );
            tokio::time::sleep(propagation_delay).await;
        }
    }
    info!(arn = %role.get().arn, created = role.was_created(), "role ready");
    Ok(role)
}

/// Ensure the source bucket exists; a bucket we already own counts as existing.
pub async fn ensure_bucket(
    storage: &dyn ObjectStore,
    bucket: &str,
    region: &str,
) -> Result<Provisioned<String>> {
    ensure(
        "bucket",
        bucket,
        || async move { storage.create_bucket(bucket, region).await.map(|_| bucket.to_string()) },
        || async move { Ok(bucket.to_string()) },
    )
    .await
}

/// Create the build project, or update it in place if the name is taken.
pub async fn ensure_build_project(
    builds: &dyn BuildService,
    spec: &BuildProjectSpec,
) -> Result<Provisioned<String>> {
    ensure(
        "build_project",
        &spec.name,
        || async move { builds.create_project(spec).await.map(|_| spec.name.clone()) },
        || async move { builds.update_project(spec).await.map(|_| spec.name.clone()) },
    )
    .await
}
