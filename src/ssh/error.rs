// ABOUTME: Errors raised while talking to a release host over SSH.
// ABOUTME: Connection and credential problems are kept apart from failures of a running command.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not connect to {0}")]
    Connection(String),

    #[error("authentication failed: the host accepted none of the offered keys")]
    AuthenticationFailed,

    #[error("no SSH credentials: {0}")]
    AgentUnavailable(String),

    #[error("cannot load SSH key {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    /// The channel for a command could not be set up.
    #[error("SSH channel error: {0}")]
    CommandFailed(String),

    #[error("command did not finish within {0:?}")]
    CommandTimeout(Duration),

    /// The channel ended before the command reported an exit status.
    #[error("connection dropped before the command exited")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
