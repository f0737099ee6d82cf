// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands, their deploy:* aliases, and environment-driven arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cutover")]
#[command(about = "Zero-downtime release directory deployments over SSH")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results (for CI)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which configuration and hosts an invocation applies to.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Target destination (defined in config)
    #[arg(short, long, global = true)]
    pub destination: Option<String>,

    /// Comma-separated hosts replacing the configured servers
    #[arg(long, global = true, env = "HOSTS", value_delimiter = ',')]
    pub hosts: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new cutover.yml configuration file
    Init {
        /// Application name
        #[arg(long)]
        application: Option<String>,

        /// Repository URL
        #[arg(long)]
        repository: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Check dependencies, update, then clean up old releases
    #[command(alias = "deploy:default")]
    Deploy {
        /// Skip the preflight dependency check
        #[arg(long)]
        skip_check: bool,

        /// Keep all releases instead of cleaning up
        #[arg(long)]
        keep_all: bool,
    },

    /// Create the release directory layout on every host
    #[command(alias = "deploy:setup")]
    Setup,

    /// Create a release and point current at it, rolling back on failure
    #[command(alias = "deploy:update")]
    Update,

    /// Create a release without switching current
    #[command(alias = "deploy:update_code")]
    UpdateCode,

    /// Point current at the newest release
    #[command(alias = "deploy:symlink")]
    Symlink,

    /// Return to the previous release and remove the newer one
    #[command(alias = "deploy:rollback")]
    Rollback,

    /// Remove releases outside the retention window
    #[command(alias = "deploy:cleanup")]
    Cleanup,

    /// Verify local and remote dependencies
    #[command(alias = "deploy:check")]
    Check,

    /// Show commits since the live revision
    #[command(alias = "deploy:pending")]
    Pending {
        /// Show the diff instead of the log
        #[arg(long)]
        diff: bool,
    },

    /// Copy local files into the live release
    #[command(alias = "deploy:upload")]
    Upload {
        /// Comma-separated files, directories and globs
        #[arg(long, env = "FILES")]
        files: Option<String>,
    },

    /// Manage the maintenance page
    #[command(subcommand)]
    Web(WebCommand),

    /// Link content directories of the live release into the served tree
    #[command(alias = "deploy:links")]
    Links,

    /// List releases, marking the live one
    #[command(alias = "deploy:releases")]
    Releases,

    /// Print settings from PHP config files as JSON
    WpConfig {
        /// Files to read; later files override earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum WebCommand {
    /// Put up the maintenance page
    Disable {
        /// Why the site is down
        #[arg(long, env = "REASON")]
        reason: Option<String>,

        /// When the site will be back
        #[arg(long, env = "UNTIL")]
        until: Option<String>,
    },

    /// Take down the maintenance page
    Enable,
}
