// ABOUTME: Release queries answered by the primary target host.
// ABOUTME: Lists releases, reads REVISION markers, and resolves the current pointer.

use super::{ReleaseName, ReleasePaths, ReleaseSet};
use crate::deploy::DeployError;
use crate::executor::{Executor, TargetSet};
use crate::shell::quote_arg;

/// Whether an operation runs as part of a deploy that just created a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Mid-deploy: this release was created by the running update.
    Deploying(ReleaseName),
    /// Invoked on its own, e.g. to repair the `current` pointer.
    Standalone,
}

/// Read-only view of the releases on a target set.
#[derive(Debug, Clone, Copy)]
pub struct Releases<'a> {
    executor: &'a Executor,
    paths: &'a ReleasePaths,
    targets: &'a TargetSet,
}

impl<'a> Releases<'a> {
    pub fn new(executor: &'a Executor, paths: &'a ReleasePaths, targets: &'a TargetSet) -> Self {
        Self {
            executor,
            paths,
            targets,
        }
    }

    /// All releases, oldest first. An empty directory is an empty set; a
    /// directory that cannot be listed is an error.
    pub async fn list(&self) -> Result<ReleaseSet, DeployError> {
        let releases = self.paths.releases();
        let listing = self
            .executor
            .capture(&format!("ls -1 {}", quote_arg(&releases)), self.targets)
            .await
            .map_err(|e| DeployError::no_release(format!("cannot list {releases}: {e}")))?;
        Ok(ReleaseSet::from_listing(&listing))
    }

    /// Newest release, if any.
    pub async fn current_release(&self) -> Result<Option<ReleaseName>, DeployError> {
        Ok(self.list().await?.current().cloned())
    }

    /// Second newest release, if any.
    pub async fn previous_release(&self) -> Result<Option<ReleaseName>, DeployError> {
        Ok(self.list().await?.previous().cloned())
    }

    /// Revision recorded in a release's REVISION file.
    pub async fn revision_of(&self, name: &ReleaseName) -> Result<String, DeployError> {
        self.read_marker(&self.paths.revision_file(name)).await
    }

    /// Revision of the release `current` points to.
    pub async fn current_revision(&self) -> Result<String, DeployError> {
        self.read_marker(&self.paths.current_revision_file()).await
    }

    /// Revision of the newest release.
    pub async fn latest_revision(&self) -> Result<String, DeployError> {
        let latest = self
            .current_release()
            .await?
            .ok_or_else(|| DeployError::no_release("no releases deployed"))?;
        self.revision_of(&latest).await
    }

    /// Revision of the second newest release, if there is one.
    pub async fn previous_revision(&self) -> Result<Option<String>, DeployError> {
        match self.previous_release().await? {
            Some(previous) => Ok(Some(self.revision_of(&previous).await?)),
            None => Ok(None),
        }
    }

    /// Raw target of the `current` symlink, if there is one.
    pub async fn current_link(&self) -> Result<Option<String>, DeployError> {
        let current = quote_arg(&self.paths.current());
        let target = self
            .executor
            .capture(
                &format!("if [ -L {current} ]; then readlink {current}; fi"),
                self.targets,
            )
            .await?;
        Ok(Some(target).filter(|t| !t.is_empty()))
    }

    /// Release the `current` symlink points to, if it exists and points into
    /// the releases directory.
    pub async fn current_target(&self) -> Result<Option<ReleaseName>, DeployError> {
        Ok(self
            .current_link()
            .await?
            .and_then(|link| self.paths.release_name_of(&link)))
    }

    /// The release a symlink operation should point at: the one being
    /// deployed, or the newest existing release when run standalone.
    pub async fn latest_or_current(
        &self,
        invocation: &Invocation,
    ) -> Result<ReleaseName, DeployError> {
        match invocation {
            Invocation::Deploying(name) => Ok(name.clone()),
            Invocation::Standalone => self
                .current_release()
                .await?
                .ok_or_else(|| DeployError::no_release("no releases deployed")),
        }
    }

    async fn read_marker(&self, path: &str) -> Result<String, DeployError> {
        self.executor
            .capture(&format!("cat {}", quote_arg(path)), self.targets)
            .await
            .map_err(|e| DeployError::no_release(format!("cannot read {path}: {e}")))
    }
}
