use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{FluxifyError, Result};
use super::ToolCommand;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            status: Some(0),
            ..Default::default()
        }
    }

    pub fn with_stdout<S: Into<String>>(stdout: S) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Map a non-zero exit into `ToolInvocationFailure`
    pub fn into_result(self, command: &ToolCommand) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let stderr = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        Err(FluxifyError::ToolInvocationFailure {
            tool: command.program.clone(),
            code: self.status,
            stderr,
        })
    }
}

/// Port through which every external program is started.
///
/// Implementations block (asynchronously) until the process exits.
/// A process that cannot be started must surface as `ToolNotAvailable`;
/// a non-zero exit is reported through `ToolOutput::status`, not as an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        debug!("Executing {}: {} {:?}", command.description, command.program, command.args);

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FluxifyError::ToolNotAvailable {
                tool: command.program.clone(),
                reason: e.to_string(),
            })?;

        // Dropping the wait future on timeout kills the child (kill_on_drop).
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| FluxifyError::ToolTimedOut {
                    tool: command.program.clone(),
                    secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        let result = ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("{} exited with {:?}", command.program, result.status);
        Ok(result)
    }
}
