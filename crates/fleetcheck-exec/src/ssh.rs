//! SSH command execution using russh crate

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use russh::keys::PrivateKeyWithHashAlg;
use russh::keys::ssh_key;
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use crate::error::ExecError;
use crate::keys::load_private_key;
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::CommandExecutor;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Unknown host keys are accepted and not persisted
        Ok(true)
    }
}

/// SSH command executor
///
/// Holds one authenticated session, opened eagerly by [`SshExecutor::connect`].
/// Every command runs on a fresh channel of that session.
pub struct SshExecutor {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// Authenticated session, `None` once disconnected
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Load the private key, connect and authenticate
    ///
    /// Connecting and authenticating together must finish within
    /// `conn_info.connect_timeout`.
    ///
    /// # Errors
    /// Returns `ExecError::SshKeyError` if the key cannot be loaded,
    /// `ExecError::Timeout` if the deadline passes, and
    /// `ExecError::ConnectionFailed` / `ExecError::AuthenticationFailed`
    /// for transport and authentication failures.
    #[instrument(skip(conn_info), fields(host = %conn_info.host, port = conn_info.port))]
    pub async fn connect(conn_info: ConnectionInfo) -> Result<Self, ExecError> {
        let key =
            load_private_key(&conn_info.private_key).map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        info!(
            host = %conn_info.host,
            port = conn_info.port,
            user = %conn_info.user,
            "connecting to SSH"
        );

        let session = timeout(conn_info.connect_timeout, Self::open(&conn_info, key))
            .await
            .map_err(|_| {
                error!(host = %conn_info.host, timeout = ?conn_info.connect_timeout, "SSH connect timed out");
                ExecError::Timeout {
                    host: conn_info.host.clone(),
                    timeout: conn_info.connect_timeout,
                }
            })??;

        info!(host = %conn_info.host, "SSH connected and authenticated");

        Ok(Self {
            conn_info,
            session: Mutex::new(Some(session)),
        })
    }

    async fn open(
        conn_info: &ConnectionInfo,
        key: ssh_key::PrivateKey,
    ) -> Result<client::Handle<SshClientHandler>, ExecError> {
        let config = Arc::new(client::Config::default());

        let mut session = client::connect(
            config,
            (&conn_info.host[..], conn_info.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| ExecError::ConnectionFailed {
            host: conn_info.host.clone(),
            message: e.to_string(),
        })?;

        let auth_failed = |message: String| ExecError::AuthenticationFailed {
            host: conn_info.host.clone(),
            user: conn_info.user.clone(),
            message,
        };

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth_res = session
            .authenticate_publickey(
                &conn_info.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(|e| auth_failed(e.to_string()))?;

        if !auth_res.success() {
            return Err(auth_failed("public key authentication rejected".to_string()));
        }

        Ok(session)
    }
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    #[instrument(skip(self, cmd), fields(host = %self.conn_info.host))]
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let session_lock = self.session.lock().await;
        let session = session_lock.as_ref().ok_or(ExecError::NotConnected)?;

        debug!(command = %cmd, "executing remote command");

        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // The exit status may arrive after EOF, so drain until the channel closes
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status } => status = exit_status.cast_signed(),
                _ => {}
            }
        }

        let duration = start.elapsed();

        debug!(
            command = %cmd,
            status = status,
            duration = ?duration,
            "remote command completed"
        );

        Ok(CommandResult {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            duration,
        })
    }

    async fn close(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.conn_info.host, "SSH disconnected");
        }
        Ok(())
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}
