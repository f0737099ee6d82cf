// ABOUTME: Release orchestrator composing executor, release model, checks and transactions.
// ABOUTME: setup, check, update_code, symlink, update and deploy live here.

use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;

use super::DeployError;
use crate::check::{CheckSpec, CheckSuite, Checker};
use crate::config::Config;
use crate::diagnostics::{Diagnostics, Warning};
use crate::executor::{Executor, RoleFilter, TargetSet};
use crate::maintenance::{DefaultPage, MaintenancePage};
use crate::release::{Invocation, ReleaseName, ReleasePaths, Releases};
use crate::scm::{self, ScmQuery};
use crate::shell::{quote_all, quote_arg};
use crate::strategy::{self, AcquisitionStrategy, StrategyContext};
use crate::transaction::{Compensation, Transaction};

/// Options for a full deploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Skip the preflight dependency check.
    pub skip_check: bool,
    /// Keep every release instead of applying the retention window.
    pub keep_all: bool,
}

/// Runs the release lifecycle against the configured hosts.
pub struct Orchestrator {
    pub(super) config: Config,
    pub(super) executor: Executor,
    pub(super) paths: ReleasePaths,
    strategy: Box<dyn AcquisitionStrategy>,
    pub(super) scm: Arc<dyn ScmQuery>,
    pub(super) page: Box<dyn MaintenancePage + Send + Sync>,
    diagnostics: Mutex<Diagnostics>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("application", &self.config.application)
            .field("deploy_to", &self.paths.deploy_to())
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        config: Config,
        executor: Executor,
        strategy: Box<dyn AcquisitionStrategy>,
        scm: Arc<dyn ScmQuery>,
    ) -> Self {
        let paths = ReleasePaths::for_config(&config);
        Self {
            config,
            executor,
            paths,
            strategy,
            scm,
            page: Box::new(DefaultPage),
            diagnostics: Mutex::new(Diagnostics::default()),
        }
    }

    /// Orchestrator using the configured scm and `deploy_via` strategy.
    pub fn for_config(config: Config, executor: Executor) -> Self {
        let git = Arc::new(scm::for_config(&config, &executor));
        let strategy = strategy::for_config(&config, git.clone());
        Self::new(config, executor, strategy, git)
    }

    pub fn with_page(mut self, page: impl MaintenancePage + Send + Sync + 'static) -> Self {
        self.page = Box::new(page);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &ReleasePaths {
        &self.paths
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Warnings collected so far; the accumulator is emptied.
    pub fn take_warnings(&self) -> Vec<Warning> {
        self.diagnostics.lock().take()
    }

    pub(super) fn warn(&self, warning: Warning) {
        self.diagnostics.lock().warn(warning);
    }

    /// Resolve the hosts for one operation.
    pub fn targets(&self, filter: &RoleFilter) -> Result<TargetSet, DeployError> {
        Ok(TargetSet::resolve(self.config.servers.iter(), filter)?)
    }

    pub fn releases<'a>(&'a self, targets: &'a TargetSet) -> Releases<'a> {
        Releases::new(&self.executor, &self.paths, targets)
    }

    /// Close transport connections. Failures become warnings.
    pub async fn close(&self) {
        if let Err(e) = self.executor.close().await {
            self.warn(Warning::ssh_disconnect(format!(
                "failed to close connections: {e}"
            )));
        }
    }

    /// Create the directory layout. Safe to re-run.
    pub async fn setup(&self) -> Result<(), DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let mut dirs = vec![
            self.paths.deploy_to().to_string(),
            self.paths.releases(),
            self.paths.shared(),
        ];
        dirs.extend(
            self.config
                .shared_children
                .iter()
                .map(|child| self.paths.shared_child(child)),
        );
        let dirs = quote_all(&dirs);

        self.executor
            .try_sudo(&format!("mkdir -p {dirs}"), &targets)
            .await?;
        if self.config.group_writable {
            self.executor
                .try_sudo(&format!("chmod g+w {dirs}"), &targets)
                .await?;
        }
        tracing::info!("set up {} on {} host(s)", self.paths.deploy_to(), targets.len());
        Ok(())
    }

    /// Run the strategy checks plus the configured dependencies.
    ///
    /// Returns the suite when everything passed and
    /// [`DeployError::DependencyCheckFailed`] otherwise.
    pub async fn check(&self) -> Result<CheckSuite, DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let mut specs: Vec<CheckSpec> = self.strategy.checks(&self.paths);
        specs.extend(self.config.dependencies.iter().cloned());

        Checker::new(&self.executor, &targets, &self.config.gem_command)
            .run(&specs)
            .await
            .into_result()
    }

    /// Preflight check (unless skipped), update, then cleanup (unless
    /// keeping everything).
    ///
    /// Once `update` commits the release is live, so a failed cleanup is
    /// reported as a warning rather than failing the deploy.
    pub async fn deploy(&self, options: DeployOptions) -> Result<ReleaseName, DeployError> {
        if !options.skip_check {
            self.check().await?;
        }
        let release = self.update().await?;
        if !options.keep_all
            && let Err(e) = self.cleanup().await
        {
            tracing::warn!("cleanup after deploying {} failed: {}", release, e);
            self.warn(Warning::cleanup_failed(format!(
                "{release} is live but cleanup failed: {e}"
            )));
        }
        Ok(release)
    }

    /// Create a new release and point `current` at it as one transaction.
    pub async fn update(&self) -> Result<ReleaseName, DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let revision = self.scm.query_revision(&self.config.branch).await?;
        let release = ReleaseName::generate();
        let invocation = Invocation::Deploying(release.clone());

        let mut tx = Transaction::started();
        let result = async {
            self.stage_update_code(&mut tx, &targets, &release, &revision)
                .await?;
            self.stage_symlink(&mut tx, &targets, &invocation).await?;
            tx.commit()
        }
        .await;
        self.finish(&tx, result)?;

        tracing::info!("released {} at revision {}", release, revision);
        Ok(release.clone())
    }

    /// Create a new release without repointing `current`.
    pub async fn update_code(&self) -> Result<ReleaseName, DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let revision = self.scm.query_revision(&self.config.branch).await?;
        let release = ReleaseName::generate();

        let mut tx = Transaction::started();
        let result = async {
            self.stage_update_code(&mut tx, &targets, &release, &revision)
                .await?;
            tx.commit()
        }
        .await;
        self.finish(&tx, result)?;
        Ok(release.clone())
    }

    /// Point `current` at the newest release.
    pub async fn symlink(&self) -> Result<ReleaseName, DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let invocation = Invocation::Standalone;

        let mut tx = Transaction::started();
        let result = async {
            let target = self.stage_symlink(&mut tx, &targets, &invocation).await?;
            tx.commit()?;
            Ok(target)
        }
        .await;
        self.finish(&tx, result)
    }

    /// Refuses an existing release, registers its removal, then runs the
    /// strategy and `finalize_update`.
    pub(crate) async fn stage_update_code<'a>(
        &'a self,
        tx: &mut Transaction<'a>,
        targets: &'a TargetSet,
        release: &'a ReleaseName,
        revision: &'a str,
    ) -> Result<(), DeployError> {
        tx.step("reserve release", self.ensure_release_absent(release, targets))
            .await?;

        let path = self.paths.release(release);
        tx.on_rollback(
            format!("remove {path}"),
            self.compensate(format!("rm -rf {}; true", quote_arg(&path)), targets),
        )?;

        tx.step("update_code", async {
            let ctx = StrategyContext {
                executor: &self.executor,
                targets,
                paths: &self.paths,
                release,
                revision,
            };
            tracing::debug!("acquiring {} via {}", release, self.strategy.name());
            self.strategy.deploy(&ctx).await?;
            self.finalize_update(release, targets).await
        })
        .await
    }

    /// Fail if `release` is already on any host, so the removal registered
    /// for it can never hit an existing release.
    async fn ensure_release_absent(
        &self,
        release: &ReleaseName,
        targets: &TargetSet,
    ) -> Result<(), DeployError> {
        let command = format!("test -e {}", quote_arg(&self.paths.release(release)));
        let mut hosts = Vec::new();
        for (host, result) in self.executor.probe(&command, targets).await {
            if result?.success() {
                hosts.push(host);
            }
        }
        if hosts.is_empty() {
            return Ok(());
        }
        Err(DeployError::ReleaseExists {
            release: release.clone(),
            hosts,
        })
    }

    /// Make the release group-writable when configured to.
    async fn finalize_update(
        &self,
        release: &ReleaseName,
        targets: &TargetSet,
    ) -> Result<(), DeployError> {
        if self.config.group_writable {
            let path = quote_arg(&self.paths.release(release));
            self.executor
                .run(&format!("chmod -R g+w {path}"), targets)
                .await?;
        }
        Ok(())
    }

    /// Registers restoring the previous `current`, then repoints it.
    pub(crate) async fn stage_symlink<'a>(
        &'a self,
        tx: &mut Transaction<'a>,
        targets: &'a TargetSet,
        invocation: &'a Invocation,
    ) -> Result<ReleaseName, DeployError> {
        let releases = self.releases(targets);
        let (target, previous) = tx
            .step("resolve symlink target", async {
                let target = releases.latest_or_current(invocation).await?;
                let previous = releases.current_link().await?;
                Ok((target, previous))
            })
            .await?;

        let (label, compensation): (String, Compensation<'a>) = match previous {
            Some(link) => {
                let label = match self.paths.release_name_of(&link) {
                    Some(name) => format!("point current back at {name}"),
                    None => format!("point current back at {link}"),
                };
                (
                    label,
                    async move { self.link_current(&link, targets).await }.boxed_local(),
                )
            }
            None => (
                "remove current".to_string(),
                async move {
                    self.warn(Warning::no_rollback_target(
                        "no previous release to rollback to, rollback of symlink skipped",
                    ));
                    let current = quote_arg(&self.paths.current());
                    self.executor
                        .run(&format!("rm -f {current}"), targets)
                        .await?;
                    Ok(())
                }
                .boxed_local(),
            ),
        };
        tx.on_rollback(label, compensation)?;

        tx.step("symlink", self.point_current(&target, targets))
            .await?;
        Ok(target)
    }

    /// Atomically replace `current` with a link to `release`.
    pub(crate) async fn point_current(
        &self,
        release: &ReleaseName,
        targets: &TargetSet,
    ) -> Result<(), DeployError> {
        self.link_current(&self.paths.release(release), targets)
            .await?;
        tracing::debug!("current -> {}", release);
        Ok(())
    }

    /// Atomically replace `current` with a link to `target`.
    ///
    /// The link is staged as `current.next` and renamed over `current`; a
    /// staged link left by a failed rename is removed.
    async fn link_current(&self, target: &str, targets: &TargetSet) -> Result<(), DeployError> {
        let current = self.paths.current();
        let staged = quote_arg(&format!("{current}.next"));
        let command = format!(
            "ln -sfn {} {staged} && {{ mv -Tf {staged} {} || {{ rm -f {staged}; false; }}; }}",
            quote_arg(target),
            quote_arg(&current)
        );
        self.executor.run(&command, targets).await?;
        Ok(())
    }

    /// A compensation that runs `command` on `targets`.
    pub(super) fn compensate<'a>(
        &'a self,
        command: String,
        targets: &'a TargetSet,
    ) -> Compensation<'a> {
        async move {
            self.executor.run(&command, targets).await?;
            Ok(())
        }
        .boxed_local()
    }

    /// Record unwind failures and pass the result through.
    pub(super) fn finish<T>(
        &self,
        tx: &Transaction<'_>,
        result: Result<T, DeployError>,
    ) -> Result<T, DeployError> {
        if result.is_err() {
            for failure in tx.unwind_failures() {
                self.warn(Warning::rollback_step(format!(
                    "rollback step '{}' failed: {}",
                    failure.label, failure.error
                )));
            }
        }
        result
    }
}
