//! The backend against a shell script standing in for the `aws` binary.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use agentcore_aws::{AwsBackend, AwsCli};
use agentcore_core::cloud::{IdentityService, RuntimeData, RuntimeInvocation, RuntimeSpec};
use agentcore_core::fakes::RecordingImageEngine;
use agentcore_core::provision::ensure_repository;
use agentcore_core::runtime::create_or_update_runtime;
use agentcore_core::{CloudError, ImageReference};
use tempfile::TempDir;

/// Write an executable script that dispatches on "$1 $2".
fn script(dir: &Path, body: &str) -> String {
    let path = dir.join("aws");
    let text = format!("#!/bin/sh\ncase \"$1 $2\" in\n{}\n*) echo \"unexpected $*\" >&2; exit 2;;\nesac\n", body);
    std::fs::write(&path, text).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path.display().to_string()
}

fn backend(program: String) -> AwsBackend {
    AwsBackend::with_cli(AwsCli::new("us-east-1").with_program(program))
}

#[tokio::test]
async fn caller_account_decodes_sts_output() {
    let dir = TempDir::new().expect("tempdir");
    let program = script(
        dir.path(),
        r#""sts get-caller-identity") echo '{"Account": "123456789012", "Arn": "arn", "UserId": "u"}';;"#,
    );
    let clients = backend(program).clients(Arc::new(RecordingImageEngine::new()));
    let account = clients.identity.caller_account().await.expect("account");
    assert_eq!(account, "123456789012");
}

#[tokio::test]
async fn existing_repository_is_looked_up() {
    let dir = TempDir::new().expect("tempdir");
    let program = script(
        dir.path(),
        r#""ecr create-repository") echo "An error occurred (RepositoryAlreadyExistsException) when calling the CreateRepository operation: exists" >&2; exit 254;;
"ecr describe-repositories") echo '{"repositories": [{"repositoryName": "agentcore/demo", "repositoryUri": "1.dkr.ecr.us-east-1.amazonaws.com/agentcore/demo"}]}';;"#,
    );
    let clients = backend(program).clients(Arc::new(RecordingImageEngine::new()));

    let repo = ensure_repository(clients.registry.as_ref(), "agentcore/demo")
        .await
        .expect("ensure");
    assert!(!repo.was_created());
    assert_eq!(repo.get().uri, "1.dkr.ecr.us-east-1.amazonaws.com/agentcore/demo");
}

#[tokio::test]
async fn runtime_conflict_falls_back_to_update() {
    let dir = TempDir::new().expect("tempdir");
    let program = script(
        dir.path(),
        r#""bedrock-agentcore-control create-agent-runtime") echo "An error occurred (ConflictException) when calling the CreateAgentRuntime operation: already exists" >&2; exit 254;;
"bedrock-agentcore-control list-agent-runtimes") echo '{"agentRuntimes": [{"agentRuntimeId": "demo-1", "agentRuntimeName": "demo", "agentRuntimeArn": "arn:rt/demo-1"}]}';;
"bedrock-agentcore-control update-agent-runtime") echo '{"agentRuntimeId": "demo-1", "agentRuntimeArn": "arn:rt/demo-1", "status": "UPDATING"}';;"#,
    );
    let clients = backend(program).clients(Arc::new(RecordingImageEngine::new()));

    let runtime = create_or_update_runtime(
        clients.control.as_ref(),
        "demo",
        &ImageReference::new("1.dkr.ecr.us-east-1.amazonaws.com/agentcore/demo", "latest"),
        "arn:role",
        "PUBLIC",
    )
    .await
    .expect("update path");
    assert_eq!(runtime.agent_id, "demo-1");
    assert_eq!(runtime.agent_arn, "arn:rt/demo-1");
}

#[tokio::test]
async fn missing_role_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let program = script(
        dir.path(),
        r#""iam get-role") echo "An error occurred (NoSuchEntity) when calling the GetRole operation: The role with name x cannot be found." >&2; exit 254;;"#,
    );
    let clients = backend(program).clients(Arc::new(RecordingImageEngine::new()));
    let err = clients.identity.get_role("x").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn runtime_invocation_reads_outfile() {
    let dir = TempDir::new().expect("tempdir");
    // The outfile is the argument just before the appended `--region`.
    let program = script(
        dir.path(),
        r#""bedrock-agentcore invoke-agent-runtime")
  out=""
  for a in "$@"; do
    if [ "$a" = "--region" ]; then break; fi
    out="$a"
  done
  echo '{"output": {"message": {"role": "assistant", "content": [{"text": "hi"}]}, "request_timestamp": "2026-01-01T00:00:00Z"}}' > "$out"
  echo '{"statusCode": 200, "contentType": "application/json"}';;"#,
    );
    let clients = backend(program).clients(Arc::new(RecordingImageEngine::new()));
    let body = clients
        .data
        .invoke_runtime(&RuntimeInvocation {
            agent_arn: "arn:rt/demo-1".to_string(),
            qualifier: "DEFAULT".to_string(),
            session_id: None,
            payload: br#"{"prompt":"hi"}"#.to_vec(),
        })
        .await
        .expect("invoke");
    let value: serde_json::Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(value["output"]["message"]["content"][0]["text"], "hi");
}

#[tokio::test]
async fn unknown_failure_is_command_error() {
    let dir = TempDir::new().expect("tempdir");
    let program = script(dir.path(), "");
    let clients = backend(program).clients(Arc::new(RecordingImageEngine::new()));
    let err = clients
        .control
        .create_runtime(&RuntimeSpec {
            name: "demo".to_string(),
            container_uri: "x:latest".to_string(),
            role_arn: "arn".to_string(),
            network_mode: "PUBLIC".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::Command(_)));
}
