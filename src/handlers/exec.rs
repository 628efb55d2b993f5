// ABOUTME: Handler that runs external commands and shell scripts
// ABOUTME: Captures stdout/stderr/exit code and honors timeouts and cancellation

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::{HandlerCall, HandlerContext, HandlerOutcome, TaskHandler};
use crate::engine::error::{EngineError, Result};

/// Runs a single command (`command` + `args`) or a shell script (`script`
/// fed to `shell -c`). The two modes are mutually exclusive. The process's
/// captured streams and exit code become the task output.
pub struct ExecHandler;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecParams {
    #[serde(default)]
    command: Option<String>,

    #[serde(default)]
    args: Vec<String>,

    #[serde(default)]
    script: Option<String>,

    /// Shell interpreter for script mode.
    #[serde(default = "default_shell")]
    shell: String,

    #[serde(default)]
    env: HashMap<String, String>,

    #[serde(default)]
    working_dir: Option<String>,

    /// Maximum execution time in milliseconds. Unset means no limit.
    #[serde(default)]
    timeout_ms: Option<u64>,

    /// Exit codes considered successful.
    #[serde(default = "default_exit_codes")]
    expected_exit_codes: Vec<i32>,
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

fn default_exit_codes() -> Vec<i32> {
    vec![0]
}

impl ExecParams {
    fn parse(parameters: &Value) -> Result<Self> {
        let params: ExecParams = serde_json::from_value(parameters.clone())
            .map_err(|e| EngineError::invalid_parameter("exec", e.to_string()))?;
        match (&params.command, &params.script) {
            (None, None) => Err(EngineError::invalid_parameter(
                "command",
                "one of 'command' or 'script' is required",
            )),
            (Some(_), Some(_)) => Err(EngineError::invalid_parameter(
                "command",
                "'command' and 'script' are mutually exclusive",
            )),
            _ => Ok(params),
        }
    }

    fn build_command(&self) -> Command {
        let mut cmd = match (&self.command, &self.script) {
            (Some(command), _) => {
                let mut cmd = Command::new(command);
                cmd.args(&self.args);
                cmd
            }
            (None, Some(script)) => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(script);
                cmd
            }
            (None, None) => unreachable!("parse() rejects parameter sets without a mode"),
        };
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TaskHandler for ExecHandler {
    fn name(&self) -> &'static str {
        "exec"
    }

    async fn execute(&self, call: HandlerCall, ctx: HandlerContext) -> Result<HandlerOutcome> {
        let params = ExecParams::parse(&call.parameters)?;
        let mut cmd = params.build_command();

        if let Some(command) = &params.command {
            info!("task {}: executing command {}", call.task_id, command);
        } else {
            info!("task {}: executing script via {}", call.task_id, params.shell);
        }

        let child = cmd.spawn()?;
        let wait = child.wait_with_output();

        let output = tokio::select! {
            result = async {
                match params.timeout_ms {
                    Some(ms) => tokio::time::timeout(Duration::from_millis(ms), wait)
                        .await
                        .map_err(|_| EngineError::handler(format!("process timed out after {}ms", ms)))?
                        .map_err(EngineError::from),
                    None => wait.await.map_err(EngineError::from),
                }
            } => result?,
            _ = ctx.cancel.cancelled() => return Err(EngineError::Interrupted),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);
        debug!("task {}: process exited with code {}", call.task_id, exit_code);

        if !params.expected_exit_codes.contains(&exit_code) {
            let detail = if stderr.trim().is_empty() {
                String::new()
            } else {
                format!(": {}", stderr.trim())
            };
            return Err(EngineError::handler(format!(
                "process exited with unexpected code {}{}",
                exit_code, detail
            )));
        }

        Ok(HandlerOutcome::Completed(json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": exit_code,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::call_and_ctx;
    use crate::parser::TaskDefinition;

    fn definition() -> TaskDefinition {
        TaskDefinition {
            name: Some("shell".to_string()),
            handler: "exec".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_ambiguous_mode() {
        assert!(ExecParams::parse(&json!({})).is_err());
        assert!(ExecParams::parse(&json!({"command": "true", "script": "true"})).is_err());
        assert!(ExecParams::parse(&json!({"command": "true"})).is_ok());
        assert!(ExecParams::parse(&json!({"script": "exit 0"})).is_ok());
    }

    #[tokio::test]
    async fn test_command_captures_output() {
        let (mut call, ctx) = call_and_ctx(definition(), Value::Null, Value::Null);
        call.parameters = json!({"command": "echo", "args": ["hello"]});
        let outcome = ExecHandler.execute(call, ctx).await.unwrap();
        match outcome {
            HandlerOutcome::Completed(output) => {
                assert_eq!(output["stdout"], json!("hello\n"));
                assert_eq!(output["exit_code"], json!(0));
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_is_read_in_milliseconds() {
        let params = ExecParams::parse(&json!({"command": "true", "timeout_ms": 250})).unwrap();
        assert_eq!(params.timeout_ms, Some(250));
    }

    #[tokio::test]
    async fn test_slow_process_fails_with_timeout() {
        let (mut call, ctx) = call_and_ctx(definition(), Value::Null, Value::Null);
        call.parameters = json!({"script": "sleep 5", "shell": "/bin/sh", "timeout_ms": 100});
        let err = ExecHandler.execute(call, ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::Handler(m) if m.contains("timed out after 100ms")));
    }

    #[tokio::test]
    async fn test_unexpected_exit_code_fails() {
        let (mut call, ctx) = call_and_ctx(definition(), Value::Null, Value::Null);
        call.parameters = json!({"script": "echo boom >&2; exit 3", "shell": "/bin/sh"});
        let err = ExecHandler.execute(call, ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::Handler(m) if m.contains("code 3")));
    }

    #[tokio::test]
    async fn test_expected_exit_codes_override() {
        let (mut call, ctx) = call_and_ctx(definition(), Value::Null, Value::Null);
        call.parameters = json!({
            "script": "exit 3",
            "shell": "/bin/sh",
            "expected_exit_codes": [0, 3],
        });
        let outcome = ExecHandler.execute(call, ctx).await.unwrap();
        assert!(matches!(outcome, HandlerOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (mut call, ctx) = call_and_ctx(definition(), Value::Null, Value::Null);
        call.parameters = json!({
            "script": "echo \"$GREETING from $(pwd)\"",
            "shell": "/bin/sh",
            "env": {"GREETING": "hi"},
            "working_dir": dir.path().to_string_lossy(),
        });
        let outcome = ExecHandler.execute(call, ctx).await.unwrap();
        match outcome {
            HandlerOutcome::Completed(output) => {
                let stdout = output["stdout"].as_str().unwrap();
                assert!(stdout.starts_with("hi from "));
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }
}
