// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Shell tool
//!
//! Runs a shell command given in the step parameters:
//!
//! ```yaml
//! params:
//!   command: "cargo clippy -- -D warnings"
//!   shell: bash        # optional, defaults to sh
//!   env: { RUST_LOG: debug }
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Instant;
use tokio::process::Command;

use super::{Tool, ToolError};

const DEFAULT_SHELL: &str = "sh";

/// Shell tool
pub struct ShellTool {
    working_dir: PathBuf,
    shell: String,
}

impl ShellTool {
    /// Create a shell tool that runs commands in `working_dir`
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    /// Use a different default shell
    pub fn with_shell(mut self, shell: &str) -> Self {
        self.shell = shell.to_string();
        self
    }
}

#[async_trait]
impl Tool for ShellTool {
    async fn invoke(&self, action: &str, params: &Value) -> Result<Value, ToolError> {
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::new(format!("shell action '{}' has no command", action)))?;

        let shell = params
            .get("shell")
            .and_then(Value::as_str)
            .unwrap_or(&self.shell);

        let start = Instant::now();

        let mut cmd = Command::new(shell);
        cmd.arg("-c").arg(command);
        cmd.current_dir(&self.working_dir);
        cmd.env("TOOLFLOW_ACTION", action);

        if let Some(env) = params.get("env").and_then(Value::as_object) {
            for (k, v) in env {
                let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                cmd.env(k, value);
            }
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| ToolError::new(format!("failed to spawn '{}': {}", shell, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(json!({
                "stdout": stdout,
                "stderr": stderr,
                "exit_code": 0,
                "duration_ms": start.elapsed().as_millis() as u64,
            }))
        } else {
            let exit_code = output.status.code().unwrap_or(-1);
            let detail = stderr.trim();

            Err(if detail.is_empty() {
                ToolError::new(format!("command exited with code {}", exit_code))
            } else {
                ToolError::new(format!("command exited with code {}: {}", exit_code, detail))
            })
        }
    }

    async fn check_available(&self) -> bool {
        which::which(&self.shell).is_ok()
    }
}
