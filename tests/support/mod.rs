// ABOUTME: Test support utilities.
// ABOUTME: Throwaway deploy roots, fake scm and strategies, and a recording transport.

#![allow(dead_code)]

use async_trait::async_trait;
use cutover::config::{Config, ServerConfig};
use cutover::deploy::{DeployError, Orchestrator};
use cutover::executor::{Executor, LocalTransport, Transport, TransportError};
use cutover::release::ReleaseName;
use cutover::scm::ScmQuery;
use cutover::ssh::CommandOutput;
use cutover::strategy::{AcquisitionStrategy, StrategyContext};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("cutover=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const REVISION: &str = "0123456789abcdef0123456789abcdef01234567";

/// A deploy root in a temporary directory, laid out as after `setup`.
pub struct Site {
    dir: TempDir,
    pub keep_releases: usize,
}

impl Site {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app/releases")).unwrap();
        std::fs::create_dir_all(dir.path().join("app/shared")).unwrap();
        Self {
            dir,
            keep_releases: 5,
        }
    }

    /// A deploy root where `setup` has not run yet.
    pub fn bare() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            dir,
            keep_releases: 5,
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("app")
    }

    pub fn deploy_to(&self) -> String {
        self.root().to_string_lossy().to_string()
    }

    pub fn releases_dir(&self) -> PathBuf {
        self.root().join("releases")
    }

    pub fn release_dir(&self, name: &str) -> PathBuf {
        self.releases_dir().join(name)
    }

    pub fn current(&self) -> PathBuf {
        self.root().join("current")
    }

    pub fn config(&self) -> Config {
        let yaml = format!(
            r#"
application: site
repository: git@example.com:org/site.git
deploy_to: {}
keep_releases: {}
servers:
  - localhost
"#,
            self.deploy_to(),
            self.keep_releases
        );
        Config::from_yaml(&yaml).unwrap()
    }

    /// Create a release directory with a REVISION file.
    pub fn add_release(&self, name: &str, revision: &str) {
        let dir = self.release_dir(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("REVISION"), format!("{revision}\n")).unwrap();
    }

    /// Point `current` at a release the way the orchestrator does.
    pub fn point_current(&self, name: &str) {
        let current = self.current();
        let _ = std::fs::remove_file(&current);
        std::os::unix::fs::symlink(self.release_dir(name), current).unwrap();
    }

    /// Release names on disk, oldest first.
    pub fn releases(&self) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(self.releases_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    /// Release `current` points to, if any.
    pub fn current_release(&self) -> Option<String> {
        let target = std::fs::read_link(self.current()).ok()?;
        Some(target.file_name()?.to_string_lossy().to_string())
    }
}

/// Scm that resolves every reference to [`REVISION`].
pub struct FixedScm;

#[async_trait]
impl ScmQuery for FixedScm {
    async fn query_revision(&self, _reference: &str) -> Result<String, DeployError> {
        Ok(REVISION.to_string())
    }

    async fn diff(&self, since: &str) -> Result<String, DeployError> {
        Ok(format!("diff since {since}"))
    }

    async fn log(&self, since: &str) -> Result<String, DeployError> {
        Ok(format!("log since {since}"))
    }
}

/// Creates the release directory and writes REVISION, like a real strategy.
pub struct CopyStrategy;

#[async_trait]
impl AcquisitionStrategy for CopyStrategy {
    fn name(&self) -> &str {
        "copy"
    }

    async fn deploy(&self, ctx: &StrategyContext<'_>) -> Result<(), DeployError> {
        let command = format!("mkdir -p {} && {}", ctx.release_path(), ctx.mark());
        ctx.executor.run(&command, ctx.targets).await?;
        Ok(())
    }
}

/// Creates the release directory, then fails.
pub struct BrokenStrategy;

#[async_trait]
impl AcquisitionStrategy for BrokenStrategy {
    fn name(&self) -> &str {
        "broken"
    }

    async fn deploy(&self, ctx: &StrategyContext<'_>) -> Result<(), DeployError> {
        ctx.executor
            .run(&format!("mkdir -p {}", ctx.release_path()), ctx.targets)
            .await?;
        Err(DeployError::Strategy("clone failed halfway".to_string()))
    }
}

type FailWhen = Box<dyn Fn(&ServerConfig, &str) -> bool + Send + Sync>;

/// Runs commands locally and records them as `host: command`.
///
/// Commands for which the predicate returns true are not run and report
/// exit status 1. In dry mode nothing is run at all.
pub struct RecordingTransport {
    commands: Mutex<Vec<String>>,
    fail_when: FailWhen,
    dry: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_when: Box::new(|_, _| false),
            dry: false,
        }
    }

    pub fn dry() -> Self {
        Self {
            dry: true,
            ..Self::new()
        }
    }

    pub fn failing_when(
        mut self,
        predicate: impl Fn(&ServerConfig, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_when = Box::new(predicate);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// Index of the first recorded command containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.commands.lock().iter().position(|c| c.contains(needle))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn exec(
        &self,
        server: &ServerConfig,
        command: &str,
    ) -> Result<CommandOutput, TransportError> {
        self.commands
            .lock()
            .push(format!("{}: {}", server.host, command));
        if (self.fail_when)(server, command) {
            return Ok(CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "injected failure".to_string(),
            });
        }
        if self.dry {
            return Ok(CommandOutput::default());
        }
        LocalTransport.exec(server, command).await
    }

    async fn put(
        &self,
        server: &ServerConfig,
        contents: &[u8],
        path: &str,
        mode: u32,
    ) -> Result<CommandOutput, TransportError> {
        self.commands
            .lock()
            .push(format!("{}: put {} ({:o})", server.host, path, mode));
        if self.dry {
            return Ok(CommandOutput::default());
        }
        LocalTransport.put(server, contents, path, mode).await
    }
}

/// Orchestrator for `site` running "remote" commands locally.
pub fn orchestrator(
    site: &Site,
    transport: Arc<dyn Transport>,
    strategy: impl AcquisitionStrategy + 'static,
) -> Orchestrator {
    let config = site.config();
    let executor = Executor::for_config(transport, &config);
    Orchestrator::new(config, executor, Box::new(strategy), Arc::new(FixedScm))
}

/// Orchestrator with a plain local transport and a working strategy.
pub fn local_orchestrator(site: &Site) -> Orchestrator {
    orchestrator(site, Arc::new(LocalTransport), CopyStrategy)
}

pub fn release(name: &str) -> ReleaseName {
    ReleaseName::new(name).unwrap()
}

pub fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
