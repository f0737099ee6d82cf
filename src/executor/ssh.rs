// ABOUTME: SSH transport with one lazily-opened session per host.
// ABOUTME: Sessions are reused across commands and closed together at the end.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::error::TransportError;
use super::transport::Transport;
use crate::config::ServerConfig;
use crate::shell::quote_arg;
use crate::ssh::{CommandOutput, Session};

/// Session pool keyed by `host:port`.
pub struct SshTransport {
    command_timeout: Duration,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("command_timeout", &self.command_timeout)
            .field("sessions", &self.sessions.lock().len())
            .finish()
    }
}

impl SshTransport {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            command_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn key(server: &ServerConfig) -> String {
        format!("{}:{}", server.host, server.port)
    }

    async fn session(&self, server: &ServerConfig) -> Result<Arc<Session>, TransportError> {
        let key = Self::key(server);
        let existing = self.sessions.lock().get(&key).cloned();
        if let Some(session) = existing {
            return Ok(session);
        }

        // Connect without holding the lock; a concurrent connect to the same
        // host keeps whichever session landed first.
        let session = Arc::new(
            Session::connect(server.ssh_session_config(self.command_timeout)).await?,
        );
        let session = Arc::clone(self.sessions.lock().entry(key).or_insert(session));
        Ok(session)
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(
        &self,
        server: &ServerConfig,
        command: &str,
    ) -> Result<CommandOutput, TransportError> {
        let session = self.session(server).await?;
        Ok(session.exec(command).await?)
    }

    async fn put(
        &self,
        server: &ServerConfig,
        contents: &[u8],
        path: &str,
        mode: u32,
    ) -> Result<CommandOutput, TransportError> {
        let session = self.session(server).await?;
        let quoted = quote_arg(path);
        let command = format!("cat > {quoted} && chmod {mode:o} {quoted}");
        Ok(session.exec_with_input(&command, contents).await?)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let sessions: Vec<_> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        let mut first_error = None;
        for session in sessions {
            if let Err(e) = session.disconnect().await {
                tracing::warn!("SSH disconnect failed for {}: {}", session.host(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
