use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::SYSTEM_PROMPT;
use crate::data::CodeOracle;
use crate::error::OracleError;

#[derive(Deserialize)]
struct RunnerResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Oracle delegating to an external program over stdio.
///
/// The program receives one JSON object on stdin
/// (`{"model", "system_prompt", "prompt"}`) and must print one JSON object
/// (`{"success", "output", "error"}`) on stdout.
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    model: String,
    timeout: Duration,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            model: model.into(),
            timeout,
        }
    }

    /// Splits `command_line` on whitespace: program first, then arguments.
    pub fn from_command_line(command_line: &str, model: &str, timeout: Duration) -> Result<Self, OracleError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| OracleError::NotConfigured("command".to_string()))?;
        Ok(Self::new(program, parts.collect(), model, timeout))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn exchange(&self, request: &str) -> Result<String, OracleError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Unavailable(format!("failed to spawn {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.as_bytes())
                .await
                .map_err(|e| OracleError::RequestFailed(format!("failed to write to {}: {}", self.program, e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OracleError::RequestFailed(format!("failed to read from {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(OracleError::RequestFailed(format!(
                "{} exited with {}. Stderr: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| OracleError::RequestFailed(format!("invalid UTF-8 from {}: {}", self.program, e)))
    }
}

impl CodeOracle for CommandOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let request = serde_json::json!({
            "model": self.model,
            "system_prompt": SYSTEM_PROMPT,
            "prompt": prompt,
        })
        .to_string();

        debug!("running oracle command {}", self.program);
        let stdout = tokio::time::timeout(self.timeout, self.exchange(&request))
            .await
            .map_err(|_| {
                OracleError::Unavailable(format!("{} timed out after {}s", self.program, self.timeout.as_secs()))
            })??;

        parse_response(&stdout)
    }
}

fn parse_response(stdout: &str) -> Result<String, OracleError> {
    let response: RunnerResponse = serde_json::from_str(stdout.trim())
        .map_err(|e| OracleError::RequestFailed(format!("failed to parse oracle response: {}", e)))?;

    if !response.success {
        return Err(OracleError::RequestFailed(
            response.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    match response.output {
        Some(output) if !output.trim().is_empty() => Ok(output),
        _ => Err(OracleError::EmptyResponse),
    }
}
