// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates cutover.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(
    dir: &Path,
    application: Option<&str>,
    repository: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(app) = application {
        if app.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "application name cannot be empty".to_string(),
            ));
        }
        config.application = app.to_string();
        config.deploy_to = format!("/home/deploy/{app}");
    }

    if let Some(repo) = repository {
        config.repository = repo.to_string();
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let first_server = config.servers.first();
    format!(
        r#"application: {}
repository: {}
deploy_to: {}
branch: {}

# How releases are materialised: checkout, export, or remote_cache
deploy_via: {}
keep_releases: {}
group_writable: {}
use_sudo: {}

shared_children:
  - config

servers:
  - host: {}
    port: {}
    user: {}
    roles: [web, app]
    # SSH host key verification (default here: strict)
    # Set to true to enable Trust-On-First-Use, or pre-populate ~/.ssh/known_hosts
    trust_first_connection: {}

# Preflight checks run by `cutover check`
# dependencies:
#   - location: remote
#     kind: command
#     name: php
"#,
        config.application,
        config.repository,
        config.deploy_to,
        config.branch,
        config.deploy_via,
        config.keep_releases,
        config.group_writable,
        config.use_sudo,
        first_server.host,
        first_server.port,
        first_server.user.as_deref().unwrap_or("deploy"),
        first_server.trust_first_connection,
    )
}
