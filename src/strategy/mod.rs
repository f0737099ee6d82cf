// ABOUTME: Code acquisition strategies that materialize a new release directory.
// ABOUTME: checkout, export and remote_cache; each writes the REVISION marker.

mod remote;
mod remote_cache;

pub use remote::{Checkout, Export};
pub use remote_cache::{REPOSITORY_CACHE, RemoteCache};

use async_trait::async_trait;
use std::sync::Arc;

use crate::check::{CheckKind, CheckSpec};
use crate::config::{Config, DeployVia};
use crate::deploy::DeployError;
use crate::executor::{Executor, TargetSet};
use crate::release::{ReleaseName, ReleasePaths};
use crate::scm::ScmCommands;
use crate::shell::quote_arg;

/// Everything a strategy needs to build one release.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub executor: &'a Executor,
    pub targets: &'a TargetSet,
    pub paths: &'a ReleasePaths,
    pub release: &'a ReleaseName,
    pub revision: &'a str,
}

impl StrategyContext<'_> {
    pub fn release_path(&self) -> String {
        self.paths.release(self.release)
    }

    /// Shell fragment that records the revision in the new release.
    pub fn mark(&self) -> String {
        format!(
            "(echo {} > {})",
            quote_arg(self.revision),
            quote_arg(&self.paths.revision_file(self.release))
        )
    }
}

/// Pluggable mechanism that produces the files of a new release.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Create the release directory at `ctx.release_path()` on every target,
    /// including its REVISION file.
    async fn deploy(&self, ctx: &StrategyContext<'_>) -> Result<(), DeployError>;

    /// Preflight checks this strategy depends on.
    fn checks(&self, paths: &ReleasePaths) -> Vec<CheckSpec> {
        base_checks(paths)
    }
}

/// Checks shared by every strategy: the layout from `setup` exists and is
/// writable.
pub fn base_checks(paths: &ReleasePaths) -> Vec<CheckSpec> {
    let releases = paths.releases();
    let deploy_to = paths.deploy_to().to_string();
    vec![
        CheckSpec::remote(CheckKind::Directory {
            path: releases.clone(),
        })
        .with_message(format!(
            "`{releases}' does not exist. Please run `cutover setup'."
        )),
        CheckSpec::remote(CheckKind::Writable {
            path: deploy_to.clone(),
        })
        .with_message(format!(
            "You do not have permissions to write to `{deploy_to}'."
        )),
        CheckSpec::remote(CheckKind::Writable {
            path: releases.clone(),
        })
        .with_message(format!(
            "You do not have permissions to write to `{releases}'."
        )),
    ]
}

/// Checks for strategies that run the scm on the release hosts.
fn scm_checks(scm: &dyn ScmCommands, paths: &ReleasePaths) -> Vec<CheckSpec> {
    let mut checks = base_checks(paths);
    checks.push(CheckSpec::remote(CheckKind::Command {
        name: scm.command().to_string(),
    }));
    checks.push(CheckSpec::local(CheckKind::Command {
        name: scm.command().to_string(),
    }));
    checks
}

/// Build the strategy selected by `deploy_via`.
pub fn for_config(
    config: &Config,
    scm: Arc<dyn ScmCommands>,
) -> Box<dyn AcquisitionStrategy> {
    match config.deploy_via {
        DeployVia::Checkout => Box::new(Checkout::new(scm)),
        DeployVia::Export => Box::new(Export::new(scm)),
        DeployVia::RemoteCache => Box::new(RemoteCache::new(scm)),
    }
}
