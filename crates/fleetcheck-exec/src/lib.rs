//! fleetcheck-exec: Command execution transports
//!
//! Runs a shell command either as a local child process or over an SSH session
//! and reports exit status and both output streams in a uniform shape.

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeyError, load_private_key};
pub use local::LocalExecutor;
pub use result::{CommandResult, ConnectionInfo};
pub use ssh::SshExecutor;
pub use traits::CommandExecutor;
