// ABOUTME: Command module aggregator for the cutover CLI.
// ABOUTME: Builds the orchestrator for an invocation and dispatches to command handlers.

mod lifecycle;
mod live;
mod local;

use cutover::config::Config;
use cutover::deploy::{DeployOptions, Orchestrator};
use cutover::error::Result;
use cutover::executor::{Executor, SshTransport};
use cutover::output::Output;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{Cli, Commands, TargetArgs, WebCommand};

/// Where an invocation runs and what it targets.
pub struct Context {
    pub cwd: PathBuf,
    pub target: TargetArgs,
}

impl Context {
    pub fn config(&self) -> Result<Config> {
        Config::discover(
            &self.cwd,
            self.target.destination.as_deref(),
            &self.target.hosts,
        )
    }

    /// Orchestrator talking to the configured hosts over SSH.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let config = self.config()?;
        let transport = Arc::new(SshTransport::new(config.command_timeout));
        let executor = Executor::for_config(transport, &config);
        Ok(Orchestrator::for_config(config, executor))
    }
}

/// Close connections and print collected warnings.
async fn finish(orchestrator: &Orchestrator, output: &Output) {
    orchestrator.close().await;
    for warning in orchestrator.take_warnings() {
        output.warning(&warning.message);
    }
}

pub async fn run(cli: Cli, mut output: Output) -> Result<()> {
    output.start_timer();
    let ctx = Context {
        cwd: env::current_dir()?,
        target: cli.target,
    };

    match cli.command {
        Commands::Init {
            application,
            repository,
            force,
        } => local::init(&ctx, application.as_deref(), repository.as_deref(), force, &output),
        Commands::WpConfig { files } => local::wp_config(&files, &output),
        Commands::Deploy {
            skip_check,
            keep_all,
        } => {
            let options = DeployOptions {
                skip_check,
                keep_all,
            };
            lifecycle::deploy(&ctx, options, &output).await
        }
        Commands::Setup => lifecycle::setup(&ctx, &output).await,
        Commands::Update => lifecycle::update(&ctx, &output).await,
        Commands::UpdateCode => lifecycle::update_code(&ctx, &output).await,
        Commands::Symlink => lifecycle::symlink(&ctx, &output).await,
        Commands::Rollback => lifecycle::rollback(&ctx, &output).await,
        Commands::Cleanup => lifecycle::cleanup(&ctx, &output).await,
        Commands::Check => lifecycle::check(&ctx, &output).await,
        Commands::Pending { diff } => live::pending(&ctx, diff, &output).await,
        Commands::Upload { files } => live::upload(&ctx, files.as_deref(), &output).await,
        Commands::Web(WebCommand::Disable { reason, until }) => {
            live::web_disable(&ctx, reason, until, &output).await
        }
        Commands::Web(WebCommand::Enable) => live::web_enable(&ctx, &output).await,
        Commands::Links => live::links(&ctx, &output).await,
        Commands::Releases => live::releases(&ctx, &output).await,
    }
}
