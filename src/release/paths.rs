// ABOUTME: Remote directory layout of a deployment.
// ABOUTME: deploy_to/{releases/<name>/REVISION, current, shared/<children>}.

use super::ReleaseName;
use crate::config::Config;

pub const RELEASES_DIR: &str = "releases";
pub const SHARED_DIR: &str = "shared";
pub const CURRENT_DIR: &str = "current";
pub const REVISION_FILE: &str = "REVISION";

/// Absolute POSIX paths on the release hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePaths {
    deploy_to: String,
}

impl ReleasePaths {
    pub fn new(deploy_to: impl Into<String>) -> Self {
        let deploy_to: String = deploy_to.into();
        Self {
            deploy_to: deploy_to.trim_end_matches('/').to_string(),
        }
    }

    pub fn for_config(config: &Config) -> Self {
        Self::new(config.deploy_to.as_str())
    }

    pub fn deploy_to(&self) -> &str {
        &self.deploy_to
    }

    pub fn releases(&self) -> String {
        join(&self.deploy_to, RELEASES_DIR)
    }

    pub fn shared(&self) -> String {
        join(&self.deploy_to, SHARED_DIR)
    }

    pub fn current(&self) -> String {
        join(&self.deploy_to, CURRENT_DIR)
    }

    pub fn release(&self, name: &ReleaseName) -> String {
        join(&self.releases(), name.as_str())
    }

    pub fn revision_file(&self, name: &ReleaseName) -> String {
        join(&self.release(name), REVISION_FILE)
    }

    pub fn current_revision_file(&self) -> String {
        join(&self.current(), REVISION_FILE)
    }

    pub fn shared_child(&self, child: &str) -> String {
        join(&self.shared(), child)
    }

    /// Map a resolved `current` target back to a release name, if it lies
    /// directly under the releases directory.
    pub fn release_name_of(&self, target: &str) -> Option<ReleaseName> {
        let target = target.trim().trim_end_matches('/');
        let releases = self.releases();
        let name = target.strip_prefix(&releases)?.strip_prefix('/')?;
        ReleaseName::new(name).ok()
    }
}

pub(crate) fn join(base: &str, child: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        child.trim_start_matches('/')
    )
}
