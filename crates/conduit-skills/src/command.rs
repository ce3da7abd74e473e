//! Subprocess-backed callables.
//!
//! The process is started in the bundle directory with the validated
//! arguments as a JSON object on stdin. Standard output is the result: parsed
//! as JSON when it is valid JSON, otherwise returned as trimmed text. A
//! non-zero exit status is a failure whose message is taken from stderr.
//!
//! The environment is cleared except for a small allowlist plus the
//! variables the binding explicitly passes through.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::truncate_to_boundary;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::callable::SkillFunction;
use crate::error::{CallError, CallResult};

/// Environment variables inherited by every command.
const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH", "HOME", "USER", "SHELL", "TERM", "LANG", "LC_ALL", "LC_CTYPE", "TMPDIR", "TMP",
    "TEMP",
];

/// Cap on stderr carried into a failure message.
const MAX_STDERR_BYTES: usize = 2 * 1024;

/// Cap on stdout returned to the model.
const MAX_STDOUT_BYTES: usize = 64 * 1024;

/// A callable implemented by an external program.
#[derive(Debug, Clone)]
pub struct CommandFunction {
    callable: String,
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    passthrough_env: Vec<String>,
    timeout: Duration,
}

impl CommandFunction {
    /// Create a command callable.
    pub fn new(
        callable: impl Into<String>,
        program: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            callable: callable.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            passthrough_env: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set program arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Additional environment variables to inherit.
    #[must_use]
    pub fn with_passthrough_env(mut self, vars: Vec<String>) -> Self {
        self.passthrough_env = vars;
        self
    }

    /// Set the execution timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env_clear();

        for var in ALLOWED_ENV_VARS
            .iter()
            .copied()
            .chain(self.passthrough_env.iter().map(String::as_str))
        {
            if let Ok(value) = std::env::var(var) {
                cmd.env(var, value);
            }
        }
        cmd.env("CONDUIT_CALLABLE", &self.callable);
        cmd
    }

    fn failed(&self, message: impl Into<String>) -> CallError {
        CallError::Failed {
            callable: self.callable.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl SkillFunction for CommandFunction {
    async fn invoke(&self, args: Value) -> CallResult<Value> {
        debug!(
            callable = %self.callable,
            program = %self.program,
            cwd = %self.working_dir.display(),
            "Executing command callable"
        );

        let mut cmd = self.build_command();
        let input = args.to_string();

        let output = match timeout(self.timeout, async {
            let mut child = cmd.spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                // A program that ignores stdin may close it early.
                let _ = stdin.write_all(input.as_bytes()).await;
                let _ = stdin.shutdown().await;
            }
            child.wait_with_output().await
        })
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(self.failed(format!("failed to execute command: {e}"))),
            Err(_) => {
                warn!(callable = %self.callable, "Command callable timed out");
                return Err(CallError::TimedOut {
                    callable: self.callable.clone(),
                    timeout_secs: self.timeout.as_secs(),
                });
            },
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(
                callable = %self.callable,
                exit_code,
                "Command callable failed"
            );
            let detail = truncate_to_boundary(stderr.trim(), MAX_STDERR_BYTES);
            let message = if detail.is_empty() {
                format!("exited with code {exit_code}")
            } else {
                format!("exited with code {exit_code}: {detail}")
            };
            return Err(self.failed(message));
        }

        let text = truncate_to_boundary(stdout.trim(), MAX_STDOUT_BYTES);
        Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandFunction {
        CommandFunction::new("test_tool", "sh", std::env::temp_dir())
            .with_args(vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_stdin_receives_arguments() {
        let out = sh("cat")
            .invoke(serde_json::json!({"cell": "A1"}))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"cell": "A1"}));
    }

    #[tokio::test]
    async fn test_plain_text_output() {
        let out = sh("echo 'Wrote 42 to A1'").invoke(Value::Null).await.unwrap();
        assert_eq!(out, Value::String("Wrote 42 to A1".into()));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let err = sh("echo 'quota exceeded' >&2; exit 3")
            .invoke(serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            CallError::Failed { message, .. } => {
                assert!(message.contains("code 3"));
                assert!(message.contains("quota exceeded"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = sh("sleep 5")
            .with_timeout(Duration::from_millis(100))
            .invoke(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_env_is_restricted() {
        // Cargo exports CARGO_PKG_NAME to test processes; the child must not see it.
        let out = sh("echo \"${CONDUIT_CALLABLE}:${CARGO_PKG_NAME:-unset}\"")
            .invoke(serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(out, Value::String("test_tool:unset".into()));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = CommandFunction::new("t", "/nonexistent/program", std::env::temp_dir())
            .invoke(serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "failed");
    }
}
