//! Runner for the `aws` command-line interface.
//!
//! Every call is `aws <service> <operation> ... --region R --output json`;
//! stdout is decoded as JSON and provider errors are classified from the
//! `An error occurred (<Code>)` line on stderr.

use std::sync::OnceLock;

use agentcore_core::process::{run_command, CommandSpec};
use agentcore_core::{CloudError, CloudResult};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Per-call timeout for control-plane requests.
const CALL_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            program: std::env::var("AGENTCORE_AWS_CLI").unwrap_or_else(|_| "aws".to_string()),
            region: region.into(),
            profile: std::env::var("AWS_PROFILE").ok(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn spec(&self, args: &[String], json: bool) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.program)
            .args(args.iter().cloned())
            .args(["--region", self.region.as_str()])
            .with_timeout(CALL_TIMEOUT_SECS);
        if let Some(profile) = &self.profile {
            spec = spec.args(["--profile", profile.as_str()]);
        }
        if json {
            spec = spec.args(["--output", "json"]);
        }
        spec
    }

    /// Run and return raw stdout.
    pub async fn text(&self, args: &[String]) -> CloudResult<String> {
        self.exec(self.spec(args, false)).await
    }

    /// Run and decode stdout as JSON; empty output decodes to `null`.
    pub async fn json(&self, args: &[String]) -> CloudResult<Value> {
        let stdout = self.exec(self.spec(args, true)).await?;
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&stdout)?)
    }

    /// Run and decode stdout into `T`.
    pub async fn call<T: DeserializeOwned>(&self, args: &[String]) -> CloudResult<T> {
        let value = self.json(args).await?;
        serde_json::from_value(value).map_err(|e| CloudError::Decode(e.to_string()))
    }

    async fn exec(&self, spec: CommandSpec) -> CloudResult<String> {
        debug!(command = %spec.display(), "aws call");
        let output = run_command(&spec)
            .await
            .map_err(|e| CloudError::Command(e.to_string()))?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(classify(&output.stderr))
        }
    }
}

/// Build an argument vector from string-likes.
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

fn error_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"An error occurred \(([A-Za-z0-9_.]+)\)(?: when calling the \w+ operation)?: ?(.*)").ok()
    })
    .as_ref()
}

/// Map CLI stderr to a [`CloudError`].
pub fn classify(stderr: &str) -> CloudError {
    let Some(caps) = error_line().and_then(|re| re.captures(stderr)) else {
        return CloudError::Command(stderr.trim().to_string());
    };
    let code = caps.get(1).map_or("", |m| m.as_str()).to_string();
    let message = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();

    // BucketAlreadyExists means another account owns the name.
    if (code.contains("AlreadyExists") && code != "BucketAlreadyExists")
        || code == "BucketAlreadyOwnedByYou"
        || code == "ResourceAlreadyExistsException"
    {
        CloudError::AlreadyExists {
            resource: code,
            name: message,
        }
    } else if code == "ConflictException" {
        CloudError::Conflict(message)
    } else if code == "NoSuchEntity" || code.contains("NotFound") {
        CloudError::NotFound {
            resource: code,
            name: message,
        }
    } else {
        CloudError::Service { code, message }
    }
}
