// ABOUTME: Local shell transport.
// ABOUTME: Runs "remote" commands on this machine; also backs run_local.

use async_trait::async_trait;
use std::os::unix::fs::PermissionsExt;
use std::process::Stdio;
use tokio::process::Command;

use super::error::TransportError;
use super::transport::Transport;
use crate::config::ServerConfig;
use crate::ssh::CommandOutput;

/// Run `command` through `sh -c` with extra environment variables applied to
/// the child only.
pub(crate) async fn run_shell(
    command: &str,
    env: &[(&str, &str)],
) -> std::io::Result<CommandOutput> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    // Killed by a signal: report the conventional shell status.
    let exit_code = output.status.code().map(|c| c as u32).unwrap_or(128);

    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Treats every configured host as the local machine.
///
/// Useful for single-box deployments and for exercising the release
/// lifecycle against a temporary directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTransport;

#[async_trait]
impl Transport for LocalTransport {
    async fn exec(
        &self,
        _server: &ServerConfig,
        command: &str,
    ) -> Result<CommandOutput, TransportError> {
        Ok(run_shell(command, &[]).await?)
    }

    async fn put(
        &self,
        _server: &ServerConfig,
        contents: &[u8],
        path: &str,
        mode: u32,
    ) -> Result<CommandOutput, TransportError> {
        tokio::fs::write(path, contents).await?;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        Ok(CommandOutput::default())
    }
}
