//! Caller identity and roles over `aws sts` / `aws iam`.

use async_trait::async_trait;
use serde::Deserialize;

use agentcore_core::cloud::{IdentityService, RoleDescriptor, RoleSpec};
use agentcore_core::CloudResult;

use crate::cli::{args, AwsCli};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Role {
    role_name: String,
    arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleResponse {
    role: Role,
}

impl From<RoleResponse> for RoleDescriptor {
    fn from(resp: RoleResponse) -> Self {
        Self {
            name: resp.role.role_name,
            arn: resp.role.arn,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedPolicy {
    policy_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedPoliciesResponse {
    #[serde(default)]
    attached_policies: Vec<AttachedPolicy>,
}

#[derive(Debug, Clone)]
pub struct IamIdentity {
    cli: AwsCli,
}

impl IamIdentity {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl IdentityService for IamIdentity {
    async fn caller_account(&self) -> CloudResult<String> {
        let who: CallerIdentity = self
            .cli
            .call(&args(["sts", "get-caller-identity"]))
            .await?;
        Ok(who.account)
    }

    async fn create_role(&self, spec: &RoleSpec) -> CloudResult<RoleDescriptor> {
        let trust = serde_json::to_string(&spec.trust_policy())?;
        let mut argv = args([
            "iam",
            "create-role",
            "--role-name",
            spec.name.as_str(),
            "--assume-role-policy-document",
            trust.as_str(),
        ]);
        if let Some(description) = &spec.description {
            argv.extend(args(["--description", description.as_str()]));
        }
        let resp: RoleResponse = self.cli.call(&argv).await?;
        Ok(resp.into())
    }

    async fn get_role(&self, name: &str) -> CloudResult<RoleDescriptor> {
        let resp: RoleResponse = self
            .cli
            .call(&args(["iam", "get-role", "--role-name", name]))
            .await?;
        Ok(resp.into())
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> CloudResult<()> {
        self.cli
            .json(&args([
                "iam",
                "attach-role-policy",
                "--role-name",
                role,
                "--policy-arn",
                policy_arn,
            ]))
            .await
            .map(|_| ())
    }

    async fn list_attached_role_policies(&self, role: &str) -> CloudResult<Vec<String>> {
        let resp: AttachedPoliciesResponse = self
            .cli
            .call(&args([
                "iam",
                "list-attached-role-policies",
                "--role-name",
                role,
            ]))
            .await?;
        Ok(resp
            .attached_policies
            .into_iter()
            .map(|p| p.policy_arn)
            .collect())
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> CloudResult<()> {
        self.cli
            .json(&args([
                "iam",
                "detach-role-policy",
                "--role-name",
                role,
                "--policy-arn",
                policy_arn,
            ]))
            .await
            .map(|_| ())
    }

    async fn delete_role(&self, role: &str) -> CloudResult<()> {
        self.cli
            .json(&args(["iam", "delete-role", "--role-name", role]))
            .await
            .map(|_| ())
    }
}
