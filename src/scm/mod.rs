// ABOUTME: Source-control seam.
// ABOUTME: Local revision queries for pending/deploy and command builders used by acquisition strategies.

mod git;

pub use git::Git;

use async_trait::async_trait;

use crate::config::{Config, Scm};
use crate::deploy::DeployError;
use crate::executor::Executor;

/// Questions answered from the invoking machine.
#[async_trait]
pub trait ScmQuery: Send + Sync {
    /// Resolve a branch, tag or id to a concrete revision id.
    async fn query_revision(&self, reference: &str) -> Result<String, DeployError>;

    /// Changes since `since`.
    async fn diff(&self, since: &str) -> Result<String, DeployError>;

    /// Commit log since `since`.
    async fn log(&self, since: &str) -> Result<String, DeployError>;

    /// The first revision after `revision` for log ranges.
    fn next_revision(&self, revision: &str) -> String {
        revision.to_string()
    }
}

/// Shell commands that materialize a revision on a release host.
pub trait ScmCommands: Send + Sync {
    /// Executable the release hosts need.
    fn command(&self) -> &str;

    /// Fresh working copy of `revision` at `destination`.
    fn checkout(&self, revision: &str, destination: &str) -> String;

    /// Like `checkout`, without repository metadata.
    fn export(&self, revision: &str, destination: &str) -> String;

    /// Bring an existing working copy at `destination` to `revision`.
    fn sync(&self, revision: &str, destination: &str) -> String;
}

/// The configured source-control backend.
pub fn for_config(config: &Config, executor: &Executor) -> Git {
    match config.scm {
        Scm::Git => Git::new(config.repository.clone(), executor.clone())
            .shallow_clone(config.git_shallow_clone),
    }
}
