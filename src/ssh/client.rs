// ABOUTME: SSH sessions to release hosts using russh.
// ABOUTME: Connects with agent or key credentials and runs commands with optional stdin.

use super::error::{Error, Result};
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{check_known_hosts, learn_known_hosts};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;

/// Keys tried under `~/.ssh` when no key is configured and no agent runs.
const DEFAULT_KEYS: &[&str] = &["id_ed25519", "id_rsa", "id_ecdsa"];

/// Settings for one SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key to use instead of the agent.
    pub key_path: Option<PathBuf>,
    /// Accept and remember a host key missing from known_hosts.
    pub trust_on_first_use: bool,
    /// Upper bound for a single command.
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: None,
            trust_on_first_use: false,
            command_timeout: Duration::from_secs(300),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Output of one command, remote or local.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout with the trailing newline removed.
    pub fn trimmed(&self) -> &str {
        self.stdout.trim_end()
    }
}

/// Host key verification against `~/.ssh/known_hosts`.
pub(crate) struct KnownHosts {
    host: String,
    port: u16,
    trust_on_first_use: bool,
}

impl KnownHosts {
    fn accept_unknown(&self, key: &ssh_key::PublicKey) -> bool {
        if !self.trust_on_first_use {
            tracing::error!(
                "host key for {}:{} is not in known_hosts; connect once with ssh or set trust_first_connection",
                self.host,
                self.port
            );
            return false;
        }
        tracing::warn!("trusting new host key for {}:{}", self.host, self.port);
        if let Err(e) = learn_known_hosts(&self.host, self.port, key) {
            tracing::warn!("could not record host key for {}: {}", self.host, e);
        }
        true
    }
}

impl client::Handler for KnownHosts {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => Ok(self.accept_unknown(server_public_key)),
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!("host key for {} changed; refusing to connect", self.host);
                Ok(false)
            }
            Err(e) => {
                tracing::debug!("known_hosts lookup for {} failed: {}", self.host, e);
                Ok(self.accept_unknown(server_public_key))
            }
        }
    }
}

enum Credentials {
    Agent(AgentClient<UnixStream>),
    Key(Arc<ssh_key::PrivateKey>),
}

impl Credentials {
    /// Configured key, then the agent, then the default key files.
    async fn resolve(config: &SessionConfig) -> Result<Self> {
        if let Some(path) = &config.key_path {
            let key = load_secret_key(path, None).map_err(|e| Error::KeyLoadFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            return Ok(Credentials::Key(Arc::new(key)));
        }

        if let Ok(agent) = AgentClient::connect_env().await {
            return Ok(Credentials::Agent(agent));
        }

        let home = std::env::var("HOME").map_err(|_| {
            Error::AgentUnavailable("SSH agent not available and HOME not set".to_string())
        })?;
        DEFAULT_KEYS
            .iter()
            .find_map(|name| load_secret_key(format!("{home}/.ssh/{name}"), None).ok())
            .map(|key| Credentials::Key(Arc::new(key)))
            .ok_or_else(|| {
                Error::AgentUnavailable("SSH agent not available and no default keys found".to_string())
            })
    }

    async fn authenticate(self, handle: &mut Handle<KnownHosts>, user: &str) -> Result<bool> {
        match self {
            Credentials::Agent(mut agent) => {
                let identities = agent.request_identities().await.map_err(|e| {
                    Error::AgentUnavailable(format!("failed to list agent keys: {e}"))
                })?;
                if identities.is_empty() {
                    return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
                }
                for key in identities {
                    if let Ok(result) = handle
                        .authenticate_publickey_with(user, key, None, &mut agent)
                        .await
                        && result.success()
                    {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Credentials::Key(key) => {
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();
                let result = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
        }
    }
}

/// Collects channel messages until the command has exited and its output
/// is drained.
#[derive(Default)]
struct Collected {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<u32>,
    eof: bool,
}

impl Collected {
    /// Feed one message; returns true once nothing more is expected.
    fn feed(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => self.exit_code = Some(exit_status),
            ChannelMsg::Eof => self.eof = true,
            ChannelMsg::Close => return true,
            _ => {}
        }
        self.eof && self.exit_code.is_some()
    }

    fn finish(self) -> Result<CommandOutput> {
        // no exit status: the channel died under us
        let exit_code = self.exit_code.ok_or(Error::ChannelClosed)?;
        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        })
    }
}

/// An authenticated SSH session to one host.
pub struct Session {
    config: SessionConfig,
    handle: Handle<KnownHosts>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("user", &self.config.user)
            .finish()
    }
}

impl Session {
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let credentials = Credentials::resolve(&config).await?;

        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let known_hosts = KnownHosts {
            host: config.host.clone(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
        };

        let mut handle = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            known_hosts,
        )
        .await
        .map_err(|e| Error::Connection(format!("{}:{}: {}", config.host, config.port, e)))?;

        if !credentials.authenticate(&mut handle, &config.user).await? {
            return Err(Error::AuthenticationFailed);
        }

        tracing::debug!("connected to {}@{}:{}", config.user, config.host, config.port);
        Ok(Self { config, handle })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.run(command, None).await
    }

    /// Run `command` with `input` on its stdin.
    ///
    /// Files are written this way (`cat > path`), so hosts need no SFTP
    /// subsystem.
    pub async fn exec_with_input(&self, command: &str, input: &[u8]) -> Result<CommandOutput> {
        self.run(command, Some(input)).await
    }

    async fn run(&self, command: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
        let timeout = self.config.command_timeout;
        tokio::time::timeout(timeout, self.run_channel(command, input))
            .await
            .map_err(|_| Error::CommandTimeout(timeout))?
    }

    async fn run_channel(&self, command: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
        let channel_err = |what: &str, e: russh::Error| Error::CommandFailed(format!("{what}: {e}"));

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| channel_err("failed to open channel", e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| channel_err("failed to exec command", e))?;

        if let Some(bytes) = input {
            channel
                .data(bytes)
                .await
                .map_err(|e| channel_err("failed to write stdin", e))?;
            channel
                .eof()
                .await
                .map_err(|e| channel_err("failed to close stdin", e))?;
        }

        let mut collected = Collected::default();
        while let Some(msg) = channel.wait().await {
            if collected.feed(msg) {
                break;
            }
        }
        collected.finish()
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collected_waits_for_exit_status_and_eof() {
        let mut collected = Collected::default();
        assert!(!collected.feed(ChannelMsg::ExitStatus { exit_status: 2 }));
        assert!(collected.feed(ChannelMsg::Eof));

        let output = collected.finish().unwrap();
        assert_eq!(output.exit_code, 2);
        assert!(!output.success());
    }

    #[test]
    fn close_without_exit_status_is_an_error() {
        let mut collected = Collected::default();
        assert!(collected.feed(ChannelMsg::Close));
        assert!(matches!(collected.finish(), Err(Error::ChannelClosed)));
    }

    #[test]
    fn session_config_builder() {
        let config = SessionConfig::new("web1", "deploy")
            .port(2222)
            .trust_on_first_use(true)
            .command_timeout(Duration::from_secs(60));
        assert_eq!(config.port, 2222);
        assert!(config.trust_on_first_use);
        assert_eq!(config.command_timeout, Duration::from_secs(60));
        assert!(config.key_path.is_none());
    }
}
