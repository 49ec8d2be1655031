//! In-memory fakes for the cloud traits (testing only)
//!
//! Every fake records what it was asked to do so tests can assert on call
//! counts and arguments. [`FakeCloud`] bundles one of each into a
//! [`CloudClients`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::build::ImageEngine;
use crate::cloud::*;
use crate::domain::{BuildStatus, DeployError, ImageReference, Result, RuntimeStatus};
use crate::envelope::ResponseEnvelope;

pub const FAKE_ACCOUNT: &str = "123456789012";
pub const FAKE_REGISTRY: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com";

fn injected(what: &str) -> CloudError {
    CloudError::Service {
        code: "AccessDenied".to_string(),
        message: format!("injected failure: {}", what),
    }
}

/// Pop the next scripted status, keeping the last one once the script runs out.
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>, fallback: T) -> T {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or(fallback)
    } else {
        queue.front().cloned().unwrap_or(fallback)
    }
}

// ---------------------------------------------------------------------------
// MemoryRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    repos: Mutex<HashMap<String, RepositoryDescriptor>>,
    create_calls: AtomicUsize,
    fail_delete: Mutex<bool>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.repos.lock().unwrap().contains_key(name)
    }

    pub fn fail_delete(&self) {
        *self.fail_delete.lock().unwrap() = true;
    }
}

#[async_trait]
impl ContainerRegistry for MemoryRegistry {
    async fn create_repository(
        &self,
        name: &str,
        _scan_on_push: bool,
    ) -> CloudResult<RepositoryDescriptor> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut repos = self.repos.lock().unwrap();
        if repos.contains_key(name) {
            return Err(CloudError::AlreadyExists {
                resource: "repository".to_string(),
                name: name.to_string(),
            });
        }
        let repo = RepositoryDescriptor {
            name: name.to_string(),
            uri: format!("{}/{}", FAKE_REGISTRY, name),
        };
        repos.insert(name.to_string(), repo.clone());
        Ok(repo)
    }

    async fn describe_repository(&self, name: &str) -> CloudResult<RepositoryDescriptor> {
        self.repos
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound {
                resource: "repository".to_string(),
                name: name.to_string(),
            })
    }

    async fn login_credentials(&self) -> CloudResult<RegistryCredentials> {
        Ok(RegistryCredentials {
            endpoint: format!("https://{}", FAKE_REGISTRY),
            username: "AWS".to_string(),
            password: "fake-password".to_string(),
        })
    }

    async fn delete_repository(&self, name: &str, _force: bool) -> CloudResult<()> {
        if *self.fail_delete.lock().unwrap() {
            return Err(injected("delete repository"));
        }
        self.repos
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound {
                resource: "repository".to_string(),
                name: name.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MemoryIdentity
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryIdentity {
    roles: Mutex<HashMap<String, (RoleDescriptor, Vec<String>)>>,
    create_calls: AtomicUsize,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.lock().unwrap().contains_key(name)
    }

    pub fn attached(&self, name: &str) -> Vec<String> {
        self.roles
            .lock()
            .unwrap()
            .get(name)
            .map(|(_, policies)| policies.clone())
            .unwrap_or_default()
    }

    fn not_found(name: &str) -> CloudError {
        CloudError::NotFound {
            resource: "role".to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn caller_account(&self) -> CloudResult<String> {
        Ok(FAKE_ACCOUNT.to_string())
    }

    async fn create_role(&self, spec: &RoleSpec) -> CloudResult<RoleDescriptor> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut roles = self.roles.lock().unwrap();
        if roles.contains_key(&spec.name) {
            return Err(CloudError::AlreadyExists {
                resource: "role".to_string(),
                name: spec.name.clone(),
            });
        }
        let role = RoleDescriptor {
            name: spec.name.clone(),
            arn: format!("arn:aws:iam::{}:role/{}", FAKE_ACCOUNT, spec.name),
        };
        roles.insert(spec.name.clone(), (role.clone(), Vec::new()));
        Ok(role)
    }

    async fn get_role(&self, name: &str) -> CloudResult<RoleDescriptor> {
        self.roles
            .lock()
            .unwrap()
            .get(name)
            .map(|(role, _)| role.clone())
            .ok_or_else(|| Self::not_found(name))
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> CloudResult<()> {
        let mut roles = self.roles.lock().unwrap();
        let (_, policies) = roles.get_mut(role).ok_or_else(|| Self::not_found(role))?;
        if !policies.iter().any(|p| p == policy_arn) {
            policies.push(policy_arn.to_string());
        }
        Ok(())
    }

    async fn list_attached_role_policies(&self, role: &str) -> CloudResult<Vec<String>> {
        self.roles
            .lock()
            .unwrap()
            .get(role)
            .map(|(_, policies)| policies.clone())
            .ok_or_else(|| Self::not_found(role))
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> CloudResult<()> {
        let mut roles = self.roles.lock().unwrap();
        let (_, policies) = roles.get_mut(role).ok_or_else(|| Self::not_found(role))?;
        policies.retain(|p| p != policy_arn);
        Ok(())
    }

    async fn delete_role(&self, role: &str) -> CloudResult<()> {
        let mut roles = self.roles.lock().unwrap();
        match roles.get(role) {
            None => Err(Self::not_found(role)),
            Some((_, policies)) if !policies.is_empty() => Err(CloudError::Service {
                code: "DeleteConflict".to_string(),
                message: "role still has attached policies".to_string(),
            }),
            Some(_) => {
                roles.remove(role);
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_bucket(&self, bucket: &str, _region: &str) -> CloudResult<()> {
        if !self.buckets.lock().unwrap().insert(bucket.to_string()) {
            return Err(CloudError::AlreadyExists {
                resource: "bucket".to_string(),
                name: bucket.to_string(),
            });
        }
        Ok(())
    }

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> CloudResult<()> {
        if !self.buckets.lock().unwrap().contains(bucket) {
            return Err(CloudError::NotFound {
                resource: "bucket".to_string(),
                name: bucket.to_string(),
            });
        }
        let bytes = std::fs::read(path)?;
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryBuildService
// ---------------------------------------------------------------------------

/// Build service whose build status follows a script.
#[derive(Debug, Default)]
pub struct MemoryBuildService {
    projects: Mutex<HashMap<String, BuildProjectSpec>>,
    script: Mutex<VecDeque<BuildStatus>>,
    builds_started: AtomicUsize,
    polls: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryBuildService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses returned by successive polls; the last repeats.
    pub fn with_statuses(statuses: impl IntoIterator<Item = BuildStatus>) -> Self {
        let fake = Self::default();
        *fake.script.lock().unwrap() = statuses.into_iter().collect();
        fake
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn builds_started(&self) -> usize {
        self.builds_started.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn project(&self, name: &str) -> Option<BuildProjectSpec> {
        self.projects.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl BuildService for MemoryBuildService {
    async fn create_project(&self, spec: &BuildProjectSpec) -> CloudResult<()> {
        let mut projects = self.projects.lock().unwrap();
        if projects.contains_key(&spec.name) {
            return Err(CloudError::AlreadyExists {
                resource: "project".to_string(),
                name: spec.name.clone(),
            });
        }
        projects.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn update_project(&self, spec: &BuildProjectSpec) -> CloudResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.projects
            .lock()
            .unwrap()
            .insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn start_build(&self, project: &str) -> CloudResult<String> {
        if !self.projects.lock().unwrap().contains_key(project) {
            return Err(CloudError::NotFound {
                resource: "project".to_string(),
                name: project.to_string(),
            });
        }
        let n = self.builds_started.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{}:build-{}", project, n))
    }

    async fn build_status(&self, _build_id: &str) -> CloudResult<BuildStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        Ok(next_scripted(&mut script, BuildStatus::Succeeded))
    }
}

// ---------------------------------------------------------------------------
// MemoryRuntimeControl
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RuntimeEntry {
    summary: RuntimeSummary,
    spec: RuntimeSpec,
}

/// Runtime control plane whose readiness follows a script.
#[derive(Debug, Default)]
pub struct MemoryRuntimeControl {
    runtimes: Mutex<HashMap<String, RuntimeEntry>>,
    script: Mutex<VecDeque<RuntimeStatus>>,
    /// Names that conflict on create but never show up in listings
    orphaned: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
    create_calls: AtomicUsize,
    list_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_delete: Mutex<bool>,
}

impl MemoryRuntimeControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses returned by successive `get_runtime` calls; the last repeats.
    pub fn with_statuses(statuses: impl IntoIterator<Item = RuntimeStatus>) -> Self {
        let fake = Self::default();
        *fake.script.lock().unwrap() = statuses.into_iter().collect();
        fake
    }

    /// Make `create_runtime` report a conflict for `name` without listing it.
    pub fn orphan_name(&self, name: &str) {
        self.orphaned.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_delete(&self) {
        *self.fail_delete.lock().unwrap() = true;
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn container_uri(&self, id: &str) -> Option<String> {
        self.runtimes
            .lock()
            .unwrap()
            .get(id)
            .map(|e| e.spec.container_uri.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.runtimes.lock().unwrap().contains_key(id)
    }

    fn not_found(id: &str) -> CloudError {
        CloudError::NotFound {
            resource: "runtime".to_string(),
            name: id.to_string(),
        }
    }
}

#[async_trait]
impl RuntimeControl for MemoryRuntimeControl {
    async fn create_runtime(&self, spec: &RuntimeSpec) -> CloudResult<RuntimeHandle> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut runtimes = self.runtimes.lock().unwrap();
        let taken = runtimes.values().any(|e| e.summary.name == spec.name)
            || self.orphaned.lock().unwrap().contains(&spec.name);
        if taken {
            return Err(CloudError::Conflict(format!(
                "runtime {} already exists",
                spec.name
            )));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{}-{:010}", spec.name, n);
        let summary = RuntimeSummary {
            id: id.clone(),
            name: spec.name.clone(),
            arn: format!(
                "arn:aws:bedrock-agentcore:us-east-1:{}:runtime/{}",
                FAKE_ACCOUNT, id
            ),
        };
        let handle = RuntimeHandle {
            id: id.clone(),
            arn: summary.arn.clone(),
        };
        runtimes.insert(
            id,
            RuntimeEntry {
                summary,
                spec: spec.clone(),
            },
        );
        Ok(handle)
    }

    async fn list_runtimes(&self) -> CloudResult<Vec<RuntimeSummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut all: Vec<RuntimeSummary> = self
            .runtimes
            .lock()
            .unwrap()
            .values()
            .map(|e| e.summary.clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn update_runtime(&self, id: &str, spec: &RuntimeSpec) -> CloudResult<RuntimeHandle> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut runtimes = self.runtimes.lock().unwrap();
        let entry = runtimes.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        entry.spec = spec.clone();
        Ok(RuntimeHandle {
            id: entry.summary.id.clone(),
            arn: entry.summary.arn.clone(),
        })
    }

    async fn get_runtime(&self, id: &str) -> CloudResult<RuntimeDescription> {
        let summary = self
            .runtimes
            .lock()
            .unwrap()
            .get(id)
            .map(|e| e.summary.clone())
            .ok_or_else(|| Self::not_found(id))?;
        let status = next_scripted(&mut self.script.lock().unwrap(), RuntimeStatus::Ready);
        Ok(RuntimeDescription {
            id: summary.id,
            arn: summary.arn,
            status,
        })
    }

    async fn delete_runtime(&self, id: &str) -> CloudResult<()> {
        if *self.fail_delete.lock().unwrap() {
            return Err(injected("delete runtime"));
        }
        self.runtimes
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }
}

// ---------------------------------------------------------------------------
// MemoryRuntimeData
// ---------------------------------------------------------------------------

/// Runtime data plane with per-session memory.
///
/// Each reply echoes everything said so far in the invoking session, so
/// tests can see exactly which session's content reached the reply.
#[derive(Debug, Default)]
pub struct MemoryRuntimeData {
    sessions: Mutex<HashMap<String, Vec<String>>>,
    invocations: Mutex<Vec<RuntimeInvocation>>,
    failing: Mutex<bool>,
}

impl MemoryRuntimeData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn invocations(&self) -> Vec<RuntimeInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn transcript(&self, session_id: &str) -> Vec<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RuntimeData for MemoryRuntimeData {
    async fn invoke_runtime(&self, invocation: &RuntimeInvocation) -> CloudResult<Vec<u8>> {
        if *self.failing.lock().unwrap() {
            return Err(injected("invoke"));
        }
        let request_timestamp = Utc::now();
        self.invocations.lock().unwrap().push(invocation.clone());

        let payload: serde_json::Value = serde_json::from_slice(&invocation.payload)?;
        let prompt = payload["prompt"].as_str().unwrap_or_default().to_string();
        let key = invocation
            .session_id
            .clone()
            .unwrap_or_else(|| crate::domain::DEFAULT_SESSION_ID.to_string());

        let text = {
            let mut sessions = self.sessions.lock().unwrap();
            let transcript = sessions.entry(key).or_default();
            transcript.push(prompt);
            format!("So far you said: {}", transcript.join(" | "))
        };
        let envelope = ResponseEnvelope::success(text, request_timestamp, Utc::now());
        Ok(serde_json::to_vec(&envelope)?)
    }

    async fn stop_session(
        &self,
        _agent_arn: &str,
        session_id: &str,
        _qualifier: &str,
    ) -> CloudResult<StopSessionOutcome> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(StopSessionOutcome {
            session_id: Some(session_id.to_string()),
            status_code: Some(200),
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingImageEngine
// ---------------------------------------------------------------------------

/// Image engine that records `login:`, `build:` and `push:` calls.
#[derive(Debug, Default)]
pub struct RecordingImageEngine {
    calls: Mutex<Vec<String>>,
    fail_build: Mutex<bool>,
}

impl RecordingImageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_build(&self) {
        *self.fail_build.lock().unwrap() = true;
    }
}

#[async_trait]
impl ImageEngine for RecordingImageEngine {
    async fn login(&self, credentials: &RegistryCredentials) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("login:{}", credentials.endpoint));
        Ok(())
    }

    async fn build(
        &self,
        image: &ImageReference,
        _context: &Path,
        _platform: Option<&str>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(format!("build:{}", image));
        if *self.fail_build.lock().unwrap() {
            return Err(DeployError::Subprocess("docker build exited with code 1".to_string()));
        }
        Ok(())
    }

    async fn push(&self, image: &ImageReference) -> Result<()> {
        self.calls.lock().unwrap().push(format!("push:{}", image));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeCloud
// ---------------------------------------------------------------------------

/// One of every fake, with handles kept for assertions.
#[derive(Clone, Default)]
pub struct FakeCloud {
    pub registry: Arc<MemoryRegistry>,
    pub identity: Arc<MemoryIdentity>,
    pub storage: Arc<MemoryObjectStore>,
    pub builds: Arc<MemoryBuildService>,
    pub control: Arc<MemoryRuntimeControl>,
    pub data: Arc<MemoryRuntimeData>,
    pub engine: Arc<RecordingImageEngine>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builds(mut self, builds: MemoryBuildService) -> Self {
        self.builds = Arc::new(builds);
        self
    }

    pub fn with_control(mut self, control: MemoryRuntimeControl) -> Self {
        self.control = Arc::new(control);
        self
    }

    pub fn clients(&self) -> CloudClients {
        CloudClients {
            registry: self.registry.clone(),
            identity: self.identity.clone(),
            storage: self.storage.clone(),
            builds: self.builds.clone(),
            control: self.control.clone(),
            data: self.data.clone(),
            image_engine: self.engine.clone(),
        }
    }
}
