//! Command executor trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// A transport able to run one shell command and capture its outcome.
///
/// A non-zero exit status is not an error: it is reported through
/// [`CommandResult::status`]. Errors are reserved for transport failures.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Release any session held by the executor
    async fn close(&self) -> Result<(), ExecError> {
        Ok(())
    }

    /// Short transport name used in logs
    fn executor_type(&self) -> &'static str;
}
