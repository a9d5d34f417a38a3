//! Error types for fleetcheck-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running a command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection to {host} failed: {message}")]
    ConnectionFailed {
        /// Host address
        host: String,
        /// Underlying transport error
        message: String,
    },

    /// Authentication failed
    #[error("authentication failed for {user}@{host}: {message}")]
    AuthenticationFailed {
        /// Host address
        host: String,
        /// SSH user
        user: String,
        /// Reason reported by the server or client
        message: String,
    },

    /// Connecting took longer than allowed
    #[error("connection to {host} timed out after {timeout:?}")]
    Timeout {
        /// Host address
        host: String,
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Session was closed before the command ran
    #[error("not connected")]
    NotConnected,
}

impl ExecError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed { .. } | ExecError::Timeout { .. }
        )
    }
}
