// ABOUTME: Transport trait that delivers shell commands to a host.
// ABOUTME: Implemented over SSH for real hosts and over a local shell for tests.

use async_trait::async_trait;

use super::error::TransportError;
use crate::config::ServerConfig;
use crate::ssh::CommandOutput;

/// Delivers a command string to one host and reports what happened.
///
/// A non-zero exit is not an error at this level: the caller decides what a
/// failed status means. Errors are reserved for commands that could not be
/// run or whose status was lost.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `command` through the host's shell.
    async fn exec(
        &self,
        server: &ServerConfig,
        command: &str,
    ) -> Result<CommandOutput, TransportError>;

    /// Write `contents` to `path` on the host with the given permission bits.
    async fn put(
        &self,
        server: &ServerConfig,
        contents: &[u8],
        path: &str,
        mode: u32,
    ) -> Result<CommandOutput, TransportError>;

    /// Release any connections held open.
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
