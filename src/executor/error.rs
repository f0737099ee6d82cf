// ABOUTME: Error types for command execution with the SNAFU pattern.
// ABOUTME: Separates non-zero exits from transport failures for programmatic handling.

use snafu::Snafu;

/// Failure of the transport itself (connection, spawn, timeout), as opposed
/// to a command that ran and exited non-zero.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the [`Executor`](super::Executor).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExecError {
    #[snafu(display("command `{command}` failed on {host} with exit status {exit_status}"))]
    CommandFailed {
        host: String,
        command: String,
        exit_status: u32,
        stderr: String,
    },

    #[snafu(display("could not run `{command}` on {host}: {source}"))]
    Transport {
        host: String,
        command: String,
        source: TransportError,
    },

    #[snafu(display("no target hosts match {filter}"))]
    NoTargets { filter: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecErrorKind {
    /// The command ran and exited non-zero.
    CommandFailed,
    /// The command could not be delivered or its status was lost.
    Transport,
    /// Role filtering left nothing to run on.
    NoTargets,
}

impl ExecError {
    pub fn kind(&self) -> ExecErrorKind {
        match self {
            ExecError::CommandFailed { .. } => ExecErrorKind::CommandFailed,
            ExecError::Transport { .. } => ExecErrorKind::Transport,
            ExecError::NoTargets { .. } => ExecErrorKind::NoTargets,
        }
    }

    /// Exit status if the command ran and failed.
    pub fn exit_status(&self) -> Option<u32> {
        match self {
            ExecError::CommandFailed { exit_status, .. } => Some(*exit_status),
            _ => None,
        }
    }

    /// Host the failure happened on, if any.
    pub fn host(&self) -> Option<&str> {
        match self {
            ExecError::CommandFailed { host, .. } | ExecError::Transport { host, .. } => {
                Some(host)
            }
            ExecError::NoTargets { .. } => None,
        }
    }
}
