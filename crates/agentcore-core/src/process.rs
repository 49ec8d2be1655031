//! Subprocess execution for external tooling (docker, aws).

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{DeployError, Result};

/// A command to run, with optional stdin, working directory and timeout.
#[derive(Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Written to the child's stdin, then closed
    pub stdin: Option<Vec<u8>>,
    /// Zero disables the timeout
    pub timeout_secs: u64,
    /// Stream stdout/stderr to the terminal instead of capturing them
    pub inherit_output: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            timeout_secs: 0,
            inherit_output: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.inherit_output = true;
        self
    }

    /// `program arg1 arg2 ...` for log lines.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("inherit_output", &self.inherit_output)
            .finish()
    }
}

/// Result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub success: bool,
}

impl CommandOutput {
    /// Fail with `Subprocess` unless the command exited zero.
    pub fn ensure_success(self, what: &str) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let detail = self.stderr.trim();
        Err(DeployError::Subprocess(if detail.is_empty() {
            format!("{} exited with code {}", what, self.exit_code)
        } else {
            format!("{} exited with code {}: {}", what, self.exit_code, detail)
        }))
    }
}

/// Run a command to completion.
///
/// A non-zero exit is reported in the output, not as an error; spawn
/// failures and timeouts are errors.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput> {
    let start = Instant::now();
    debug!(command = %spec.display(), "running command");

    let mut command = Command::new(&spec.program);
    command.args(&spec.args).kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    if spec.inherit_output {
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    }
    command.stdin(if spec.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = command
        .spawn()
        .map_err(|e| DeployError::Subprocess(format!("failed to spawn {}: {}", spec.program, e)))?;

    if let Some(input) = &spec.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).await?;
            stdin.shutdown().await?;
        }
    }

    let output = if spec.timeout_secs > 0 {
        tokio::time::timeout(
            Duration::from_secs(spec.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| DeployError::TimedOut {
            resource: format!("command {}", spec.program),
            waited_secs: spec.timeout_secs,
        })??
    } else {
        child.wait_with_output().await?
    };

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        success: output.status.success(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_simple_command() {
        let out = run_command(&CommandSpec::new("echo").arg("hello"))
            .await
            .expect("run failed");
        assert!(out.success);
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_failing_command_reports_exit_code() {
        let out = run_command(&CommandSpec::new("false"))
            .await
            .expect("run failed");
        assert!(!out.success);
        assert_ne!(out.exit_code, 0);
        let err = out.ensure_success("false").unwrap_err();
        assert!(matches!(err, DeployError::Subprocess(_)));
    }

    #[tokio::test]
    async fn test_stdin_is_piped() {
        let out = run_command(&CommandSpec::new("cat").with_stdin("secret-token"))
            .await
            .expect("run failed");
        assert_eq!(out.stdout, "secret-token");
    }

    #[tokio::test]
    async fn test_missing_program_is_subprocess_error() {
        let err = run_command(&CommandSpec::new("definitely-not-a-real-binary-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Subprocess(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = run_command(&CommandSpec::new("sleep").arg("5").with_timeout(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::TimedOut { waited_secs: 1, .. }));
    }

    #[test]
    fn test_debug_redacts_stdin() {
        let spec = CommandSpec::new("docker")
            .args(["login", "--password-stdin"])
            .with_stdin("pw");
        let debug = format!("{:?}", spec);
        assert!(!debug.contains("\"pw\""));
        assert!(debug.contains("<redacted>"));
        assert_eq!(spec.display(), "docker login --password-stdin");
    }
}
