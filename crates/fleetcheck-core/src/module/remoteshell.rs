//! `remoteshell`: run a command on every host of the referenced server groups

use std::time::Duration;

use async_trait::async_trait;
use fleetcheck_exec::{CommandExecutor, ConnectionInfo, SshExecutor};
use serde::Deserialize;
use tracing::{instrument, warn};

use super::shell::{Stream, evaluate};
use super::{ModuleKind, ModuleParams, ValidatorModule};
use crate::condition::MatchRule;
use crate::error::ModuleError;
use crate::manifest::Host;
use crate::result::ModuleResult;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteShellParams {
    pub command: String,
    #[serde(default)]
    pub stream: Stream,
    #[serde(default)]
    pub contains: Option<MatchRule>,
    #[serde(default)]
    pub not_contains: Option<MatchRule>,
    /// Server groups whose hosts the command runs on
    pub groups: Vec<String>,
}

impl ModuleParams for RemoteShellParams {
    const MODULE: &'static str = "remoteshell";
}

/// Runs its command once over an SSH session bound to a single host
pub struct RemoteShell {
    host: String,
    params: RemoteShellParams,
    executor: Box<dyn CommandExecutor>,
}

impl std::fmt::Debug for RemoteShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteShell")
            .field("host", &self.host)
            .field("params", &self.params)
            .field("executor", &self.executor.executor_type())
            .finish()
    }
}

impl RemoteShell {
    /// Open an authenticated session to `host`
    ///
    /// # Errors
    /// Returns `ModuleError::Exec` if the key cannot be loaded or the host
    /// cannot be reached within `connect_timeout`.
    pub async fn connect(
        host: &Host,
        params: RemoteShellParams,
        connect_timeout: Duration,
    ) -> Result<Self, ModuleError> {
        let info = ConnectionInfo::new(&host.host, &host.user, &host.private_key)
            .with_port(host.port)
            .with_connect_timeout(connect_timeout);

        let executor = SshExecutor::connect(info).await.map_err(|source| {
            warn!(
                host = %host.host,
                transient = source.is_retryable(),
                error = %source,
                "cannot open session"
            );
            ModuleError::Exec {
                module: RemoteShellParams::MODULE,
                host: host.host.clone(),
                source,
            }
        })?;

        Ok(Self::with_executor(&host.host, params, Box::new(executor)))
    }

    /// Build the module on top of an already connected executor
    pub fn with_executor(
        host: impl Into<String>,
        params: RemoteShellParams,
        executor: Box<dyn CommandExecutor>,
    ) -> Self {
        Self {
            host: host.into(),
            params,
            executor,
        }
    }
}

#[async_trait]
impl ValidatorModule for RemoteShell {
    fn kind(&self) -> ModuleKind {
        ModuleKind::RemoteShell
    }

    #[instrument(skip(self), fields(host = %self.host, command = %self.params.command))]
    async fn run(&self) -> Result<ModuleResult, ModuleError> {
        let result = self
            .executor
            .run(&self.params.command)
            .await
            .map_err(|source| ModuleError::Exec {
                module: RemoteShellParams::MODULE,
                host: self.host.clone(),
                source,
            })?;

        Ok(evaluate(
            &result,
            self.params.stream,
            self.params.contains.as_ref(),
            self.params.not_contains.as_ref(),
        ))
    }

    async fn close(&self) {
        if let Err(e) = self.executor.close().await {
            warn!(host = %self.host, error = %e, "failed to close session");
        }
    }
}
