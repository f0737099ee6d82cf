// ABOUTME: Strategies that build each release with a fresh scm working copy on the host.
// ABOUTME: Checkout keeps repository metadata; Export removes it.

use async_trait::async_trait;
use std::sync::Arc;

use super::{AcquisitionStrategy, StrategyContext, scm_checks};
use crate::check::CheckSpec;
use crate::deploy::DeployError;
use crate::release::ReleasePaths;
use crate::scm::ScmCommands;

/// Clone and check out the revision directly into the release directory.
pub struct Checkout {
    scm: Arc<dyn ScmCommands>,
}

impl Checkout {
    pub fn new(scm: Arc<dyn ScmCommands>) -> Self {
        Self { scm }
    }
}

#[async_trait]
impl AcquisitionStrategy for Checkout {
    fn name(&self) -> &str {
        "checkout"
    }

    async fn deploy(&self, ctx: &StrategyContext<'_>) -> Result<(), DeployError> {
        let command = format!(
            "{} && {}",
            self.scm.checkout(ctx.revision, &ctx.release_path()),
            ctx.mark()
        );
        ctx.executor.run(&command, ctx.targets).await?;
        Ok(())
    }

    fn checks(&self, paths: &ReleasePaths) -> Vec<CheckSpec> {
        scm_checks(self.scm.as_ref(), paths)
    }
}

/// Like [`Checkout`], but the release holds no repository metadata.
pub struct Export {
    scm: Arc<dyn ScmCommands>,
}

impl Export {
    pub fn new(scm: Arc<dyn ScmCommands>) -> Self {
        Self { scm }
    }
}

#[async_trait]
impl AcquisitionStrategy for Export {
    fn name(&self) -> &str {
        "export"
    }

    async fn deploy(&self, ctx: &StrategyContext<'_>) -> Result<(), DeployError> {
        let command = format!(
            "{} && {}",
            self.scm.export(ctx.revision, &ctx.release_path()),
            ctx.mark()
        );
        ctx.executor.run(&command, ctx.targets).await?;
        Ok(())
    }

    fn checks(&self, paths: &ReleasePaths) -> Vec<CheckSpec> {
        scm_checks(self.scm.as_ref(), paths)
    }
}
