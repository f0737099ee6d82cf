// ABOUTME: Command executor for local and remote shell commands.
// ABOUTME: Fans commands out to target hosts, applies sudo, and turns non-zero exits into errors.

mod error;
mod local;
mod ssh;
mod targets;
mod transport;

pub use error::{ExecError, ExecErrorKind, TransportError};
pub use local::LocalTransport;
pub use ssh::SshTransport;
pub use targets::{RoleFilter, TargetSet};
pub use transport::Transport;

use futures::future::join_all;
use snafu::ResultExt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, ServerConfig};
use crate::shell::{escape_command_for_shell, escape_single_quote_content};
use crate::ssh::CommandOutput;
use error::TransportSnafu;

/// Host name reported for commands run with `run_local`.
pub const LOCAL_HOST: &str = "localhost";

/// How a command is executed on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// As the connecting user.
    Direct,
    /// Through sudo, optionally as a specific user.
    Privileged { user: Option<String> },
}

impl RunMode {
    /// Render `command` for this mode.
    pub fn wrap(&self, command: &str) -> String {
        match self {
            RunMode::Direct => command.to_string(),
            RunMode::Privileged { user } => {
                let as_user = user
                    .as_deref()
                    .map(|u| format!(" -u '{}'", escape_single_quote_content(u)))
                    .unwrap_or_default();
                format!(
                    "sudo -p 'sudo password: '{} sh -c {}",
                    as_user,
                    escape_command_for_shell(command)
                )
            }
        }
    }
}

/// Output of one command on one host.
#[derive(Debug, Clone)]
pub struct HostOutput {
    pub host: String,
    pub output: CommandOutput,
}

/// Runs commands against target sets through a [`Transport`].
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    use_sudo: bool,
    admin_runner: Option<String>,
    runner: String,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("use_sudo", &self.use_sudo)
            .field("admin_runner", &self.admin_runner)
            .field("runner", &self.runner)
            .finish()
    }
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            use_sudo: false,
            admin_runner: None,
            runner: "app".to_string(),
        }
    }

    /// Executor with the escalation settings taken from `config`.
    pub fn for_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            transport,
            use_sudo: config.use_sudo,
            admin_runner: config.admin_runner.clone(),
            runner: config.runner.clone(),
        }
    }

    pub fn use_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    pub fn admin_runner(mut self, user: Option<String>) -> Self {
        self.admin_runner = user;
        self
    }

    /// Resolve the mode for a privileged command.
    ///
    /// Sudo is only used when globally enabled. The user is the per-call
    /// override, then `admin_runner`, then unset.
    pub fn privilege(&self, as_user: Option<&str>) -> RunMode {
        if !self.use_sudo {
            return RunMode::Direct;
        }
        let user = as_user
            .map(str::to_string)
            .or_else(|| self.admin_runner.clone());
        RunMode::Privileged { user }
    }

    /// Run directly on every target host.
    pub async fn run(
        &self,
        command: &str,
        targets: &TargetSet,
    ) -> Result<Vec<HostOutput>, ExecError> {
        self.run_as(command, targets, &RunMode::Direct).await
    }

    /// Run with sudo when enabled (`admin_runner` as the default user).
    pub async fn try_sudo(
        &self,
        command: &str,
        targets: &TargetSet,
    ) -> Result<Vec<HostOutput>, ExecError> {
        self.run_as(command, targets, &self.privilege(None)).await
    }

    /// Run with sudo as the application `runner` when sudo is enabled.
    pub async fn try_runner(
        &self,
        command: &str,
        targets: &TargetSet,
    ) -> Result<Vec<HostOutput>, ExecError> {
        let mode = self.privilege(Some(&self.runner));
        self.run_as(command, targets, &mode).await
    }

    /// Run on every target host in parallel and wait for all of them.
    ///
    /// Fails if any host fails; the first failure in host order is returned
    /// and every failure is logged.
    pub async fn run_as(
        &self,
        command: &str,
        targets: &TargetSet,
        mode: &RunMode,
    ) -> Result<Vec<HostOutput>, ExecError> {
        let command = mode.wrap(command);
        let results = join_all(targets.iter().map(|s| self.exec_checked(s, &command))).await;

        let mut outputs = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    tracing::error!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }

    /// Run on the primary host and return its trimmed stdout.
    pub async fn capture(&self, command: &str, targets: &TargetSet) -> Result<String, ExecError> {
        let output = self.exec_checked(targets.primary(), command).await?;
        Ok(output.output.trimmed().to_string())
    }

    /// Run on every host without judging the exit status.
    ///
    /// Used by preflight checks, where a non-zero exit is an answer rather
    /// than a failure.
    pub async fn probe(
        &self,
        command: &str,
        targets: &TargetSet,
    ) -> Vec<(String, Result<CommandOutput, ExecError>)> {
        join_all(targets.iter().map(|server| async move {
            let result = self.exec_raw(server, command).await;
            (server.host.clone(), result)
        }))
        .await
    }

    /// Write a file to every target host.
    pub async fn put(
        &self,
        contents: &[u8],
        path: &str,
        mode: u32,
        targets: &TargetSet,
    ) -> Result<(), ExecError> {
        let label = format!("put {path}");
        let results = join_all(targets.iter().map(|server| {
            let label = label.clone();
            async move {
                tracing::trace!(host = %server.host, "uploading {} bytes to {}", contents.len(), path);
                let started = Instant::now();
                let output = self
                    .transport
                    .put(server, contents, path, mode)
                    .await
                    .context(TransportSnafu {
                        host: server.host.clone(),
                        command: label.clone(),
                    })?;
                tracing::trace!(
                    host = %server.host,
                    "upload finished in {}ms",
                    started.elapsed().as_millis()
                );
                check_status(&server.host, &label, output).map(|_| ())
            }
        }))
        .await;

        results.into_iter().collect()
    }

    /// Run on the invoking machine and return stdout.
    pub async fn run_local(&self, command: &str) -> Result<String, ExecError> {
        self.run_local_with_env(command, &[]).await
    }

    /// Run on the invoking machine with extra environment variables.
    ///
    /// The variables are set on the child process only, so the caller's
    /// environment is the same afterwards whether the command succeeds or
    /// fails.
    pub async fn run_local_with_env(
        &self,
        command: &str,
        env: &[(&str, &str)],
    ) -> Result<String, ExecError> {
        let output = self.probe_local(command, env).await?;
        let output = check_status(LOCAL_HOST, command, output)?;
        Ok(output.output.stdout)
    }

    /// Run locally without judging the exit status.
    pub async fn probe_local(
        &self,
        command: &str,
        env: &[(&str, &str)],
    ) -> Result<CommandOutput, ExecError> {
        tracing::trace!("executing locally: {:?}", command);
        let started = Instant::now();
        let output = local::run_shell(command, env)
            .await
            .map_err(TransportError::from)
            .context(TransportSnafu {
                host: LOCAL_HOST,
                command,
            })?;
        tracing::trace!("command finished in {}ms", started.elapsed().as_millis());
        Ok(output)
    }

    /// Close transport connections.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.transport.close().await
    }

    async fn exec_raw(
        &self,
        server: &ServerConfig,
        command: &str,
    ) -> Result<CommandOutput, ExecError> {
        tracing::trace!(host = %server.host, "executing: {:?}", command);
        let started = Instant::now();
        let output = self
            .transport
            .exec(server, command)
            .await
            .context(TransportSnafu {
                host: server.host.clone(),
                command,
            })?;
        tracing::trace!(
            host = %server.host,
            "command finished in {}ms",
            started.elapsed().as_millis()
        );
        Ok(output)
    }

    async fn exec_checked(
        &self,
        server: &ServerConfig,
        command: &str,
    ) -> Result<HostOutput, ExecError> {
        let output = self.exec_raw(server, command).await?;
        check_status(&server.host, command, output)
    }
}

fn check_status(host: &str, command: &str, output: CommandOutput) -> Result<HostOutput, ExecError> {
    if output.success() {
        return Ok(HostOutput {
            host: host.to_string(),
            output,
        });
    }

    if !output.stderr.trim().is_empty() {
        tracing::debug!(host, "stderr: {}", output.stderr.trim());
    }

    Err(ExecError::CommandFailed {
        host: host.to_string(),
        command: command.to_string(),
        exit_status: output.exit_code,
        stderr: output.stderr,
    })
}
