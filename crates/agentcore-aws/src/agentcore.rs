//! Agent runtimes over `aws bedrock-agentcore-control` and invocations over
//! `aws bedrock-agentcore`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use agentcore_core::cloud::{
    RuntimeControl, RuntimeData, RuntimeDescription, RuntimeHandle, RuntimeInvocation,
    RuntimeSpec, RuntimeSummary, StopSessionOutcome,
};
use agentcore_core::{CloudError, CloudResult, RuntimeStatus};

use crate::cli::{args, AwsCli};

const CONTROL: &str = "bedrock-agentcore-control";
const DATA: &str = "bedrock-agentcore";

/// Artifact, role and network arguments shared by create and update.
fn binding_args(spec: &RuntimeSpec) -> Vec<String> {
    let artifact = json!({"containerConfiguration": {"containerUri": spec.container_uri}});
    let network = json!({"networkMode": spec.network_mode});
    args([
        "--agent-runtime-artifact".to_string(),
        artifact.to_string(),
        "--role-arn".to_string(),
        spec.role_arn.clone(),
        "--network-configuration".to_string(),
        network.to_string(),
    ])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeRef {
    agent_runtime_id: String,
    agent_runtime_arn: String,
}

impl From<RuntimeRef> for RuntimeHandle {
    fn from(r: RuntimeRef) -> Self {
        Self {
            id: r.agent_runtime_id,
            arn: r.agent_runtime_arn,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedRuntime {
    agent_runtime_id: String,
    agent_runtime_name: String,
    agent_runtime_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRuntimesResponse {
    #[serde(default)]
    agent_runtimes: Vec<ListedRuntime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetRuntimeResponse {
    agent_runtime_id: String,
    agent_runtime_arn: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopSessionResponse {
    runtime_session_id: Option<String>,
    status_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvokeResponse {
    status_code: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct AgentCoreControl {
    cli: AwsCli,
}

impl AgentCoreControl {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl RuntimeControl for AgentCoreControl {
    async fn create_runtime(&self, spec: &RuntimeSpec) -> CloudResult<RuntimeHandle> {
        let mut argv = args([
            CONTROL,
            "create-agent-runtime",
            "--agent-runtime-name",
            spec.name.as_str(),
        ]);
        argv.extend(binding_args(spec));
        let created: RuntimeRef = self.cli.call(&argv).await?;
        Ok(created.into())
    }

    async fn list_runtimes(&self) -> CloudResult<Vec<RuntimeSummary>> {
        let resp: ListRuntimesResponse = self
            .cli
            .call(&args([CONTROL, "list-agent-runtimes"]))
            .await?;
        Ok(resp
            .agent_runtimes
            .into_iter()
            .map(|r| RuntimeSummary {
                id: r.agent_runtime_id,
                name: r.agent_runtime_name,
                arn: r.agent_runtime_arn,
            })
            .collect())
    }

    async fn update_runtime(&self, id: &str, spec: &RuntimeSpec) -> CloudResult<RuntimeHandle> {
        let mut argv = args([CONTROL, "update-agent-runtime", "--agent-runtime-id", id]);
        argv.extend(binding_args(spec));
        let updated: RuntimeRef = self.cli.call(&argv).await?;
        Ok(updated.into())
    }

    async fn get_runtime(&self, id: &str) -> CloudResult<RuntimeDescription> {
        let resp: GetRuntimeResponse = self
            .cli
            .call(&args([CONTROL, "get-agent-runtime", "--agent-runtime-id", id]))
            .await?;
        Ok(RuntimeDescription {
            id: resp.agent_runtime_id,
            arn: resp.agent_runtime_arn,
            status: RuntimeStatus::parse(&resp.status),
        })
    }

    async fn delete_runtime(&self, id: &str) -> CloudResult<()> {
        self.cli
            .json(&args([CONTROL, "delete-agent-runtime", "--agent-runtime-id", id]))
            .await
            .map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct AgentCoreData {
    cli: AwsCli,
}

impl AgentCoreData {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

fn invoke_args(invocation: &RuntimeInvocation, payload: &str, outfile: &str) -> Vec<String> {
    let mut argv = args([
        DATA,
        "invoke-agent-runtime",
        "--agent-runtime-arn",
        invocation.agent_arn.as_str(),
        "--qualifier",
        invocation.qualifier.as_str(),
    ]);
    if let Some(session) = &invocation.session_id {
        argv.extend(args(["--runtime-session-id", session.as_str()]));
    }
    argv.extend(args([
        "--payload",
        payload,
        "--cli-binary-format",
        "raw-in-base64-out",
        outfile,
    ]));
    argv
}

#[async_trait]
impl RuntimeData for AgentCoreData {
    async fn invoke_runtime(&self, invocation: &RuntimeInvocation) -> CloudResult<Vec<u8>> {
        // The streaming body goes to a file; stdout only carries metadata.
        let outfile = tempfile::NamedTempFile::new()?;
        let outpath = outfile.path().display().to_string();
        let payload = String::from_utf8_lossy(&invocation.payload).into_owned();

        let meta: InvokeResponse = self
            .cli
            .call(&invoke_args(invocation, &payload, &outpath))
            .await?;
        if let Some(code) = meta.status_code.filter(|c| *c >= 400) {
            return Err(CloudError::Service {
                code: code.to_string(),
                message: "runtime invocation rejected".to_string(),
            });
        }
        Ok(tokio::fs::read(outfile.path()).await?)
    }

    async fn stop_session(
        &self,
        agent_arn: &str,
        session_id: &str,
        qualifier: &str,
    ) -> CloudResult<StopSessionOutcome> {
        let resp: StopSessionResponse = self
            .cli
            .call(&args([
                DATA,
                "stop-runtime-session",
                "--agent-runtime-arn",
                agent_arn,
                "--runtime-session-id",
                session_id,
                "--qualifier",
                qualifier,
            ]))
            .await?;
        Ok(StopSessionOutcome {
            session_id: resp.runtime_session_id,
            status_code: resp.status_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RuntimeSpec {
        RuntimeSpec {
            name: "demo".to_string(),
            container_uri: "123.dkr.ecr.us-east-1.amazonaws.com/agentcore/demo:latest".to_string(),
            role_arn: "arn:aws:iam::123:role/AgentCoreExecutionRole-demo".to_string(),
            network_mode: "PUBLIC".to_string(),
        }
    }

    #[test]
    fn test_binding_args_embed_json() {
        let argv = binding_args(&spec());
        let artifact: serde_json::Value = serde_json::from_str(&argv[1]).unwrap();
        assert_eq!(
            artifact["containerConfiguration"]["containerUri"],
            "123.dkr.ecr.us-east-1.amazonaws.com/agentcore/demo:latest"
        );
        let network: serde_json::Value = serde_json::from_str(&argv[5]).unwrap();
        assert_eq!(network["networkMode"], "PUBLIC");
    }

    #[test]
    fn test_invoke_args_pass_session_through() {
        let invocation = RuntimeInvocation {
            agent_arn: "arn:rt".to_string(),
            qualifier: "DEFAULT".to_string(),
            session_id: Some("s".repeat(40)),
            payload: br#"{"prompt":"hi"}"#.to_vec(),
        };
        let argv = invoke_args(&invocation, r#"{"prompt":"hi"}"#, "/tmp/out.json");
        let pos = argv
            .iter()
            .position(|a| a == "--runtime-session-id")
            .expect("session flag");
        assert_eq!(argv[pos + 1], "s".repeat(40));
        assert_eq!(argv.last().map(String::as_str), Some("/tmp/out.json"));
    }

    #[test]
    fn test_invoke_args_without_session() {
        let invocation = RuntimeInvocation {
            agent_arn: "arn:rt".to_string(),
            qualifier: "DEFAULT".to_string(),
            session_id: None,
            payload: Vec::new(),
        };
        let argv = invoke_args(&invocation, "{}", "/tmp/out.json");
        assert!(!argv.iter().any(|a| a == "--runtime-session-id"));
    }

    #[test]
    fn test_get_runtime_status_parses() {
        let body = r#"{
            "agentRuntimeId": "demo-abc",
            "agentRuntimeArn": "arn:aws:bedrock-agentcore:us-east-1:1:runtime/demo-abc",
            "agentRuntimeName": "demo",
            "status": "READY"
        }"#;
        let resp: GetRuntimeResponse = serde_json::from_str(body).unwrap();
        assert!(RuntimeStatus::parse(&resp.status).is_ready());
    }

    #[test]
    fn test_list_runtimes_response() {
        let body = r#"{"agentRuntimes": [
            {"agentRuntimeId": "demo-abc", "agentRuntimeName": "demo",
             "agentRuntimeArn": "arn:rt/demo-abc", "status": "READY"}
        ]}"#;
        let resp: ListRuntimesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.agent_runtimes[0].agent_runtime_name, "demo");
    }
}
