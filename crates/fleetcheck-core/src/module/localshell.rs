//! `localshell`: run a command on the local machine

use async_trait::async_trait;
use fleetcheck_exec::{CommandExecutor, LocalExecutor};
use serde::Deserialize;
use tracing::instrument;

use super::shell::{Stream, evaluate};
use super::{ModuleKind, ModuleParams, ValidatorModule};
use crate::condition::MatchRule;
use crate::error::ModuleError;
use crate::result::ModuleResult;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalShellParams {
    pub command: String,
    #[serde(default)]
    pub stream: Stream,
    #[serde(default)]
    pub contains: Option<MatchRule>,
    #[serde(default)]
    pub not_contains: Option<MatchRule>,
}

impl ModuleParams for LocalShellParams {
    const MODULE: &'static str = "localshell";
}

/// Runs its command once as a local child process
#[derive(Debug)]
pub struct LocalShell {
    params: LocalShellParams,
    executor: LocalExecutor,
}

impl LocalShell {
    #[must_use]
    pub fn new(params: LocalShellParams) -> Self {
        Self {
            params,
            executor: LocalExecutor::new(),
        }
    }
}

#[async_trait]
impl ValidatorModule for LocalShell {
    fn kind(&self) -> ModuleKind {
        ModuleKind::LocalShell
    }

    #[instrument(skip(self), fields(command = %self.params.command))]
    async fn run(&self) -> Result<ModuleResult, ModuleError> {
        let result = self
            .executor
            .run(&self.params.command)
            .await
            .map_err(|source| ModuleError::Exec {
                module: LocalShellParams::MODULE,
                host: "localhost".to_string(),
                source,
            })?;

        Ok(evaluate(
            &result,
            self.params.stream,
            self.params.contains.as_ref(),
            self.params.not_contains.as_ref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Status;

    fn params(yaml: &str) -> LocalShellParams {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        LocalShellParams::validate_schema(&value).unwrap()
    }

    #[test]
    fn test_schema_defaults() {
        let p = params("command: uptime");
        assert_eq!(p.stream, Stream::Stdout);
        assert!(p.contains.is_none());
        assert!(p.not_contains.is_none());

        let p = params("{command: uptime, contains: {strings: [up]}}");
        assert_eq!(p.contains.unwrap().condition, crate::condition::Condition::All);
    }

    #[test]
    fn test_schema_rejects_groups() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("{command: uptime, groups: [ms]}").unwrap();
        assert!(LocalShellParams::validate_schema(&value).is_err());
    }

    #[test]
    fn test_schema_rejects_bad_condition() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("{command: ls, contains: {strings: [a], condition: most}}").unwrap();
        let err = LocalShellParams::validate_schema(&value).unwrap_err();
        assert!(err.to_string().contains("'condition' must be one of 'any' or 'all'"));
    }

    #[tokio::test]
    async fn test_echo_contains_passes() {
        let module = LocalShell::new(params("{command: echo hello, contains: {strings: [hello]}}"));
        let result = module.run().await.unwrap();

        assert_eq!(result.status, Status::Pass);
        assert_eq!(result.info.as_deref(), Some("hello\n"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_with_stderr_reason() {
        let module = LocalShell::new(params(
            "{command: 'echo hello; echo oops >&2; exit 3', contains: {strings: [hello]}}",
        ));
        let result = module.run().await.unwrap();

        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.reason.as_deref(), Some("oops\n"));
    }

    #[tokio::test]
    async fn test_not_contains_any_fails_on_match() {
        let module = LocalShell::new(params(
            "{command: echo ERROR disk full, not_contains: {strings: [ERROR, FATAL], condition: any}}",
        ));
        let result = module.run().await.unwrap();

        assert_eq!(result.status, Status::Fail);
        assert_eq!(
            result.reason.as_deref(),
            Some("The following patterns were found in the command output: [\"ERROR\"]")
        );
    }
}
