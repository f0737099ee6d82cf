// ABOUTME: Configuration types and parsing for cutover.yml.
// ABOUTME: Parses a raw config file, merges destinations, and validates into an immutable Config.

mod deserialize;
mod init;
pub mod php;
mod server;
mod source;

pub use init::init_config;
pub use server::ServerConfig;
pub use source::{DeployVia, Scm};

use crate::check::CheckSpec;
use crate::error::{Error, Result};
use deserialize::{ServerEntry, into_servers};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "cutover.yml";
pub const CONFIG_FILENAME_ALT: &str = "cutover.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".cutover/config.yml";

/// Config file as written on disk, before validation.
///
/// Every field is optional here so that missing required settings surface as
/// [`Error::ConfigurationMissing`] instead of a YAML error, and so that
/// destinations can fill in values the top level leaves out.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub deploy_to: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub scm: Scm,
    #[serde(default)]
    pub deploy_via: DeployVia,
    #[serde(default)]
    pub use_sudo: bool,
    #[serde(default)]
    pub admin_runner: Option<String>,
    #[serde(default)]
    pub runner: Option<String>,
    #[serde(default)]
    pub group_writable: Option<bool>,
    #[serde(default)]
    pub keep_releases: Option<usize>,
    #[serde(default)]
    pub shared_children: Option<Vec<String>>,
    #[serde(default)]
    pub link_dirs: Option<Vec<String>>,
    #[serde(default)]
    pub content_dir: Option<String>,
    #[serde(default)]
    pub maintenance_basename: Option<String>,
    #[serde(default)]
    pub git_shallow_clone: Option<u32>,
    #[serde(default)]
    pub gem_command: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub command_timeout: Option<Duration>,
    #[serde(default)]
    servers: Option<Vec<ServerEntry>>,
    #[serde(default)]
    pub dependencies: Vec<CheckSpec>,
    #[serde(default)]
    pub destinations: HashMap<String, Destination>,
}

/// Per-stage overrides (e.g. `staging`, `production`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Destination {
    #[serde(default)]
    servers: Option<Vec<ServerEntry>>,
    #[serde(default)]
    pub deploy_to: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub keep_releases: Option<usize>,
}

/// Validated, immutable deployment configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub application: String,
    pub repository: String,
    pub deploy_to: String,
    pub branch: String,
    pub scm: Scm,
    pub deploy_via: DeployVia,
    pub use_sudo: bool,
    pub admin_runner: Option<String>,
    pub runner: String,
    pub group_writable: bool,
    pub keep_releases: usize,
    pub shared_children: Vec<String>,
    pub link_dirs: Vec<String>,
    pub content_dir: String,
    pub maintenance_basename: String,
    pub git_shallow_clone: Option<u32>,
    pub gem_command: String,
    pub command_timeout: Duration,
    pub servers: NonEmpty<ServerConfig>,
    pub dependencies: Vec<CheckSpec>,
}

pub const DEFAULT_KEEP_RELEASES: usize = 5;

impl ConfigFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Apply the named destination's overrides.
    pub fn for_destination(mut self, name: &str) -> Result<Self> {
        let dest = self
            .destinations
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDestination(name.to_string()))?;

        if dest.servers.is_some() {
            self.servers = dest.servers;
        }
        if dest.deploy_to.is_some() {
            self.deploy_to = dest.deploy_to;
        }
        if dest.branch.is_some() {
            self.branch = dest.branch;
        }
        if dest.keep_releases.is_some() {
            self.keep_releases = dest.keep_releases;
        }

        Ok(self)
    }

    /// Replace the server list with explicit hosts (the `HOSTS` override).
    pub fn with_hosts(mut self, hosts: &[String]) -> Self {
        if !hosts.is_empty() {
            self.servers = Some(
                hosts
                    .iter()
                    .map(|h| ServerEntry::Simple(h.clone()))
                    .collect(),
            );
        }
        self
    }

    /// Check required settings and fill in defaults.
    pub fn validate(self) -> Result<Config> {
        let application = required(
            self.application,
            "application",
            "application: my-app",
        )?;
        let repository = required(
            self.repository,
            "repository",
            "repository: git@example.com:org/my-app.git",
        )?;
        let deploy_to = required(self.deploy_to, "deploy_to", "deploy_to: /home/deploy/app")?;

        if !deploy_to.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "deploy_to must be an absolute path, got {deploy_to}"
            )));
        }

        let servers = self.servers.ok_or(Error::ConfigurationMissing {
            field: "servers",
            hint: "servers: [deploy@web1.example.com]",
        })?;
        let servers = into_servers(servers)
            .map_err(Error::InvalidConfig)?
            .ok_or_else(|| Error::InvalidConfig("at least one server is required".to_string()))?;

        let deploy_to = deploy_to.trim_end_matches('/').to_string();

        Ok(Config {
            application,
            repository,
            deploy_to,
            branch: self.branch.unwrap_or_else(|| "HEAD".to_string()),
            scm: self.scm,
            deploy_via: self.deploy_via,
            use_sudo: self.use_sudo,
            admin_runner: self.admin_runner,
            runner: self.runner.unwrap_or_else(|| "app".to_string()),
            group_writable: self.group_writable.unwrap_or(true),
            keep_releases: self.keep_releases.unwrap_or(DEFAULT_KEEP_RELEASES),
            shared_children: self
                .shared_children
                .unwrap_or_else(|| vec!["config".to_string()]),
            link_dirs: self
                .link_dirs
                .unwrap_or_else(|| vec!["themes".to_string(), "plugins".to_string()]),
            content_dir: self
                .content_dir
                .unwrap_or_else(|| "wordpress/wp-content".to_string()),
            maintenance_basename: self
                .maintenance_basename
                .unwrap_or_else(|| "maintenance".to_string()),
            git_shallow_clone: self.git_shallow_clone,
            gem_command: self.gem_command.unwrap_or_else(|| "gem".to_string()),
            command_timeout: self
                .command_timeout
                .unwrap_or_else(|| Duration::from_secs(300)),
            servers,
            dependencies: self.dependencies,
        })
    }
}

fn required(value: Option<String>, field: &'static str, hint: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::ConfigurationMissing { field, hint }),
    }
}

impl Config {
    /// Parse and validate in one go.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        ConfigFile::from_yaml(yaml)?.validate()
    }

    /// Discover the config in `dir`, apply the destination and host overrides,
    /// and validate.
    pub fn discover(dir: &Path, destination: Option<&str>, hosts: &[String]) -> Result<Self> {
        let mut file = ConfigFile::discover(dir)?;
        if let Some(dest) = destination {
            file = file.for_destination(dest)?;
        }
        file.with_hosts(hosts).validate()
    }

    pub fn template() -> Self {
        Config {
            application: "my-app".to_string(),
            repository: "git@example.com:org/my-app.git".to_string(),
            deploy_to: "/home/deploy/my-app".to_string(),
            branch: "main".to_string(),
            scm: Scm::default(),
            deploy_via: DeployVia::default(),
            use_sudo: false,
            admin_runner: None,
            runner: "app".to_string(),
            group_writable: true,
            keep_releases: DEFAULT_KEEP_RELEASES,
            shared_children: vec!["config".to_string()],
            link_dirs: vec!["themes".to_string(), "plugins".to_string()],
            content_dir: "wordpress/wp-content".to_string(),
            maintenance_basename: "maintenance".to_string(),
            git_shallow_clone: None,
            gem_command: "gem".to_string(),
            command_timeout: Duration::from_secs(300),
            servers: NonEmpty::new(ServerConfig {
                host: "server.example.com".to_string(),
                port: 22,
                user: Some("deploy".to_string()),
                roles: vec!["web".to_string(), "app".to_string()],
                no_release: false,
                key_path: None,
                trust_first_connection: false,
            }),
            dependencies: Vec::new(),
        }
    }
}
