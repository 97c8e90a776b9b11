use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::GhError;

/// Executes a gh invocation and hands back its stdout.
/// Implemented by the real subprocess runner and by scripted fakes in tests.
#[async_trait]
pub trait GhRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<String, GhError>;
}

/// Runs a CLI (gh, git) as a child process, killing it once `timeout` elapses.
pub struct SubprocessRunner {
    program: String,
    timeout: Duration,
}

impl SubprocessRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl GhRunner for SubprocessRunner {
    async fn run(&self, args: &[String]) -> Result<String, GhError> {
        let command_line = format!("{} {}", self.program, args.join(" "));
        debug!(command = %command_line, "running subprocess");

        let child = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| GhError::Timeout {
                command: command_line.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| GhError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(GhError::Failed {
                command: command_line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = stdout.len(), "gh finished");
        Ok(stdout)
    }
}
