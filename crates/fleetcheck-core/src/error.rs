//! Core error types for fleetcheck-core
//!
//! Everything here is fatal to a run. A check that merely fails is not an
//! error: it is recorded as a FAIL row in the report.

use std::path::PathBuf;

use fleetcheck_exec::ExecError;
use thiserror::Error;

/// Errors raised while constructing or running a validator module
#[derive(Error, Debug)]
pub enum ModuleError {
    /// Module parameters do not match the module's schema
    #[error("invalid `{module}` parameters: {message}")]
    Schema {
        /// Module name
        module: &'static str,
        /// Schema violation
        message: String,
    },

    /// Command transport failed (connect, authenticate, spawn, ...)
    #[error("{module} on {host}: {source}")]
    Exec {
        /// Module name
        module: &'static str,
        /// Target host
        host: String,
        /// Transport error
        #[source]
        source: ExecError,
    },

    /// HTTP request failed after the retry policy was exhausted
    #[error("apicall {method} {url}: {message}")]
    Http {
        /// Request method
        method: String,
        /// Request URL
        url: String,
        /// Failure description
        message: String,
    },
}

/// Errors raised while loading a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file could not be read
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// Manifest path
        path: PathBuf,
        /// I/O error
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid YAML or does not match the manifest schema
    #[error("invalid manifest: {0}")]
    Schema(String),
}

impl From<serde_yaml::Error> for ManifestError {
    fn from(err: serde_yaml::Error) -> Self {
        ManifestError::Schema(err.to_string())
    }
}

/// Fatal errors that abort a validation run
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A `remoteshell` validation references a server group that is not declared
    #[error("Invalid server group: `{0}`")]
    UnknownServerGroup(String),

    #[error(transparent)]
    Module(#[from] ModuleError),

    /// The report file could not be written
    #[error("failed to write report {path}: {source}")]
    ReportWrite {
        /// Report path
        path: PathBuf,
        /// I/O error
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_group_names_group() {
        let err = ValidatorError::UnknownServerGroup("db".into());
        assert_eq!(err.to_string(), "Invalid server group: `db`");
    }

    #[test]
    fn test_module_error_is_transparent() {
        let err: ValidatorError = ModuleError::Schema {
            module: "localshell",
            message: "missing field `command`".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid `localshell` parameters: missing field `command`"
        );
    }
}
