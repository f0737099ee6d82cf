// ABOUTME: Error types for release lifecycle operations.
// ABOUTME: Covers command failures, missing releases, failed preflight checks, and strategy errors.

use crate::executor::ExecError;
use crate::release::{ReleaseName, ReleaseNameError};
use crate::transaction::TransactionState;

/// Errors from deploy, symlink, rollback, cleanup, and check operations.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A remote or local command failed.
    #[error(transparent)]
    Command(#[from] ExecError),

    /// A release property was queried but no such release exists.
    #[error("no release found: {0}")]
    NoRelease(String),

    /// Rollback was requested with fewer than two releases.
    #[error("could not rollback the code because there is no prior release")]
    NoPriorRelease,

    /// One or more preflight checks failed.
    #[error(
        "the following dependencies failed, please check them and try again:\n{}",
        bullet_list(.failures)
    )]
    DependencyCheckFailed { failures: Vec<String> },

    /// The acquisition strategy could not produce a release.
    #[error("acquisition strategy failed: {0}")]
    Strategy(String),

    /// A branch or tag could not be resolved to a revision id.
    #[error("unable to resolve revision for '{reference}' on repository '{repository}'")]
    UnresolvedRevision {
        reference: String,
        repository: String,
    },

    /// A transaction was driven outside the Running state.
    #[error("transaction is {0}, not running")]
    Transaction(TransactionState),

    #[error("invalid release name: {0}")]
    ReleaseName(#[from] ReleaseNameError),

    #[error("invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// `upload` was given nothing to send.
    #[error("please specify at least one file or directory to upload (via FILES)")]
    NothingToUpload,

    /// The generated release directory is already on a host.
    #[error("release {release} already exists on {}", .hosts.join(", "))]
    ReleaseExists {
        release: ReleaseName,
        hosts: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("--> {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    CommandFailed,
    NoRelease,
    NoPriorRelease,
    DependencyCheckFailed,
    Strategy,
    Transaction,
    InvalidInput,
    /// Required settings or arguments were not given.
    Configuration,
    ReleaseExists,
    Io,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Command(_) => DeployErrorKind::CommandFailed,
            DeployError::NoRelease(_) => DeployErrorKind::NoRelease,
            DeployError::NoPriorRelease => DeployErrorKind::NoPriorRelease,
            DeployError::DependencyCheckFailed { .. } => DeployErrorKind::DependencyCheckFailed,
            DeployError::Strategy(_) | DeployError::UnresolvedRevision { .. } => {
                DeployErrorKind::Strategy
            }
            DeployError::Transaction(_) => DeployErrorKind::Transaction,
            DeployError::ReleaseName(_) | DeployError::InvalidPattern { .. } => {
                DeployErrorKind::InvalidInput
            }
            DeployError::NothingToUpload => DeployErrorKind::Configuration,
            DeployError::ReleaseExists { .. } => DeployErrorKind::ReleaseExists,
            DeployError::Io(_) => DeployErrorKind::Io,
        }
    }

    /// The underlying command failure, if this is one.
    pub fn command_error(&self) -> Option<&ExecError> {
        match self {
            DeployError::Command(e) => Some(e),
            _ => None,
        }
    }

    pub fn no_release(what: impl Into<String>) -> Self {
        DeployError::NoRelease(what.into())
    }
}
