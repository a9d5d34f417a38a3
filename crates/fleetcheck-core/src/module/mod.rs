//! Validator modules
//!
//! A module validates its own parameter block, executes one check and returns
//! a [`ModuleResult`]. Three transports exist: `remoteshell` (SSH),
//! `localshell` (child process) and `apicall` (HTTP). [`ModuleKind`] is the
//! registry of known module names and [`ModuleFactory`] constructs instances.

pub mod apicall;
pub mod localshell;
pub mod remoteshell;
pub mod shell;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::ModuleError;
use crate::manifest::Host;
use crate::result::ModuleResult;

pub use apicall::{ApiCall, ApiCallParams};
pub use localshell::{LocalShell, LocalShellParams};
pub use remoteshell::{RemoteShell, RemoteShellParams};

/// A constructed module, ready to run its check once
#[async_trait]
pub trait ValidatorModule: Send + Sync {
    fn kind(&self) -> ModuleKind;

    /// Execute the check.
    ///
    /// A failed check is `Ok` with [`Status::Fail`](crate::result::Status::Fail);
    /// `Err` means the check could not be carried out at all.
    async fn run(&self) -> Result<ModuleResult, ModuleError>;

    /// Release connections held by the module
    async fn close(&self) {}
}

/// Parameter block of a module
pub trait ModuleParams: DeserializeOwned {
    /// Module name the parameters belong to
    const MODULE: &'static str;

    /// Checks serde cannot express
    ///
    /// # Errors
    /// Returns a description of the violation.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    /// Validate raw parameters, filling defaults
    ///
    /// # Errors
    /// Returns `ModuleError::Schema` when the parameters have the wrong shape.
    fn validate_schema(params: &serde_yaml::Value) -> Result<Self, ModuleError> {
        let schema_error = |message: String| ModuleError::Schema {
            module: Self::MODULE,
            message,
        };
        let parsed: Self =
            serde_yaml::from_value(params.clone()).map_err(|e| schema_error(e.to_string()))?;
        parsed.check().map_err(schema_error)?;
        Ok(parsed)
    }
}

/// Known module names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    RemoteShell,
    LocalShell,
    ApiCall,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 3] = [
        ModuleKind::RemoteShell,
        ModuleKind::LocalShell,
        ModuleKind::ApiCall,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::RemoteShell => RemoteShellParams::MODULE,
            ModuleKind::LocalShell => LocalShellParams::MODULE,
            ModuleKind::ApiCall => ApiCallParams::MODULE,
        }
    }

    /// Look up a module by the key used in manifests
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Constructs module instances
///
/// Allows injection of different transports, e.g. in tests.
#[async_trait]
pub trait ModuleFactory: Send + Sync {
    /// Connect a remote shell module to `host`
    async fn remote_shell(
        &self,
        host: &Host,
        params: RemoteShellParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError>;

    async fn local_shell(
        &self,
        params: LocalShellParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError>;

    async fn api_call(
        &self,
        params: ApiCallParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError>;
}

/// Factory backed by the real SSH, process and HTTP transports
#[derive(Debug, Clone)]
pub struct DefaultModuleFactory {
    ssh_connect_timeout: Duration,
}

impl DefaultModuleFactory {
    #[must_use]
    pub fn new(ssh_connect_timeout: Duration) -> Self {
        Self {
            ssh_connect_timeout,
        }
    }
}

impl Default for DefaultModuleFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl ModuleFactory for DefaultModuleFactory {
    async fn remote_shell(
        &self,
        host: &Host,
        params: RemoteShellParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError> {
        let module = RemoteShell::connect(host, params, self.ssh_connect_timeout).await?;
        Ok(Box::new(module))
    }

    async fn local_shell(
        &self,
        params: LocalShellParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError> {
        Ok(Box::new(LocalShell::new(params)))
    }

    async fn api_call(
        &self,
        params: ApiCallParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError> {
        Ok(Box::new(ApiCall::new(params)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trip() {
        for kind in ModuleKind::ALL {
            assert_eq!(ModuleKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ModuleKind::from_name("filecheck"), None);
        assert_eq!(ModuleKind::ApiCall.to_string(), "apicall");
    }

    #[test]
    fn test_schema_error_names_module() {
        let params: serde_yaml::Value = serde_yaml::from_str("stream: stdout").unwrap();
        let err = LocalShellParams::validate_schema(&params).unwrap_err();

        assert!(matches!(err, ModuleError::Schema { module: "localshell", .. }));
        assert!(err.to_string().contains("command"));
    }
}
