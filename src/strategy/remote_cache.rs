// ABOUTME: Strategy that keeps a working copy in shared/ and copies it per release.
// ABOUTME: Only the changes since the last deploy cross the network.

use async_trait::async_trait;
use std::sync::Arc;

use super::{AcquisitionStrategy, StrategyContext, scm_checks};
use crate::check::{CheckKind, CheckSpec};
use crate::deploy::DeployError;
use crate::release::ReleasePaths;
use crate::scm::ScmCommands;
use crate::shell::quote_arg;

/// Name of the cached working copy under `shared/`.
pub const REPOSITORY_CACHE: &str = "cached-copy";

pub struct RemoteCache {
    scm: Arc<dyn ScmCommands>,
}

impl RemoteCache {
    pub fn new(scm: Arc<dyn ScmCommands>) -> Self {
        Self { scm }
    }

    fn update_cache_command(&self, ctx: &StrategyContext<'_>) -> String {
        let cache = ctx.paths.shared_child(REPOSITORY_CACHE);
        format!(
            "if [ -d {} ]; then {}; else {}; fi",
            quote_arg(&cache),
            self.scm.sync(ctx.revision, &cache),
            self.scm.checkout(ctx.revision, &cache)
        )
    }

    fn copy_cache_command(&self, ctx: &StrategyContext<'_>) -> String {
        format!(
            "cp -RPp {} {} && {}",
            quote_arg(&ctx.paths.shared_child(REPOSITORY_CACHE)),
            quote_arg(&ctx.release_path()),
            ctx.mark()
        )
    }
}

#[async_trait]
impl AcquisitionStrategy for RemoteCache {
    fn name(&self) -> &str {
        "remote_cache"
    }

    async fn deploy(&self, ctx: &StrategyContext<'_>) -> Result<(), DeployError> {
        ctx.executor
            .run(&self.update_cache_command(ctx), ctx.targets)
            .await?;
        ctx.executor
            .run(&self.copy_cache_command(ctx), ctx.targets)
            .await?;
        Ok(())
    }

    fn checks(&self, paths: &ReleasePaths) -> Vec<CheckSpec> {
        let mut checks = scm_checks(self.scm.as_ref(), paths);
        checks.push(CheckSpec::remote(CheckKind::Writable {
            path: paths.shared(),
        }));
        checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::executor::{Executor, LocalTransport, RoleFilter, TargetSet};
    use crate::release::ReleaseName;
    use crate::scm::Git;

    #[test]
    fn cache_is_synced_or_cloned_then_copied() {
        let executor = Executor::new(Arc::new(LocalTransport));
        let servers = [ServerConfig::parse("localhost").unwrap()];
        let targets = TargetSet::resolve(&servers, &RoleFilter::releases()).unwrap();
        let paths = ReleasePaths::new("/srv/site");
        let release = ReleaseName::new("20240101000000").unwrap();
        let ctx = StrategyContext {
            executor: &executor,
            targets: &targets,
            paths: &paths,
            release: &release,
            revision: "abc123",
        };
        let strategy = RemoteCache::new(Arc::new(Git::new("repo.git", executor.clone())));

        let update = strategy.update_cache_command(&ctx);
        assert!(update.starts_with("if [ -d /srv/site/shared/cached-copy ]; then cd /srv/site/shared/cached-copy"));
        assert!(update.contains("else git clone -q repo.git /srv/site/shared/cached-copy"));

        assert_eq!(
            strategy.copy_cache_command(&ctx),
            "cp -RPp /srv/site/shared/cached-copy /srv/site/releases/20240101000000 && \
             (echo abc123 > /srv/site/releases/20240101000000/REVISION)"
        );
    }

    #[test]
    fn checks_include_shared_writable() {
        let strategy = RemoteCache::new(Arc::new(Git::new(
            "repo.git",
            Executor::new(Arc::new(LocalTransport)),
        )));
        let checks = strategy.checks(&ReleasePaths::new("/srv/site"));
        assert!(checks.iter().any(|c| c.kind
            == CheckKind::Writable {
                path: "/srv/site/shared".to_string()
            }));
        assert!(checks.iter().any(|c| c.kind
            == CheckKind::Command {
                name: "git".to_string()
            }));
    }
}
