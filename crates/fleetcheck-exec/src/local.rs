//! Child-process execution on the machine running the checks

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::CommandExecutor;

/// Runs each command line through a shell (`sh -c` unless overridden)
///
/// Quoting, pipes, redirections and `$VAR` expansion are interpreted by the
/// shell, the same way they are on a remote host.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell: String,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl LocalExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another POSIX-compatible shell, invoked as `<shell> -c <command>`
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    #[instrument(skip(self), fields(shell = %self.shell), level = "debug")]
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExecError::SpawnError(format!("{}: {e}", self.shell)))?;

        // killed by a signal
        let status = output.status.code().unwrap_or(-1);
        let result = CommandResult {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };

        debug!(status, duration = ?result.duration, "local command finished");
        Ok(result)
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}
