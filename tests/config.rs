// ABOUTME: Integration tests for configuration discovery and validation.
// ABOUTME: Covers defaults, destinations, the HOSTS override and dependency specs.

use cutover::check::{CheckKind, Location, PackageManager};
use cutover::config::{Config, DeployVia};
use cutover::error::Error;
use std::fs;
use std::time::Duration;

const MINIMAL: &str = r#"
application: blog
repository: git@example.com:org/blog.git
deploy_to: /srv/blog/
servers:
  - deploy@web1.example.com
"#;

#[test]
fn minimal_config_fills_in_defaults() {
    let config = Config::from_yaml(MINIMAL).unwrap();

    assert_eq!(config.deploy_to, "/srv/blog");
    assert_eq!(config.branch, "HEAD");
    assert_eq!(config.deploy_via, DeployVia::RemoteCache);
    assert_eq!(config.keep_releases, 5);
    assert!(config.group_writable);
    assert!(!config.use_sudo);
    assert_eq!(config.shared_children, vec!["config"]);
    assert_eq!(config.gem_command, "gem");
    assert_eq!(config.command_timeout, Duration::from_secs(300));
    assert_eq!(config.servers.first().host, "web1.example.com");
    assert_eq!(config.servers.first().user.as_deref(), Some("deploy"));
    assert!(config.dependencies.is_empty());
}

#[test]
fn missing_required_setting_names_it() {
    let err = Config::from_yaml("application: blog\nservers: [web1]\n").unwrap_err();
    match err {
        Error::ConfigurationMissing { field, .. } => assert_eq!(field, "repository"),
        other => panic!("expected ConfigurationMissing, got {other:?}"),
    }
}

#[test]
fn missing_servers_is_configuration_missing() {
    let yaml = "application: a\nrepository: r\ndeploy_to: /srv/a\n";
    assert!(matches!(
        Config::from_yaml(yaml),
        Err(Error::ConfigurationMissing {
            field: "servers",
            ..
        })
    ));
}

#[test]
fn relative_deploy_to_is_rejected() {
    let yaml = "application: a\nrepository: r\ndeploy_to: srv/a\nservers: [web1]\n";
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("absolute path"));
}

#[test]
fn destination_overrides_top_level() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("cutover.yml"),
        format!(
            "{MINIMAL}
destinations:
  staging:
    deploy_to: /srv/blog-staging
    branch: develop
    keep_releases: 2
    servers: [staging1, staging2]
"
        ),
    )
    .unwrap();

    let config = Config::discover(dir.path(), Some("staging"), &[]).unwrap();

    assert_eq!(config.deploy_to, "/srv/blog-staging");
    assert_eq!(config.branch, "develop");
    assert_eq!(config.keep_releases, 2);
    let hosts: Vec<_> = config.servers.iter().map(|s| s.host.as_str()).collect();
    assert_eq!(hosts, vec!["staging1", "staging2"]);

    let err = Config::discover(dir.path(), Some("production"), &[]).unwrap_err();
    assert!(matches!(err, Error::UnknownDestination(name) if name == "production"));
}

#[test]
fn hosts_override_replaces_servers() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cutover.yml"), MINIMAL).unwrap();

    let hosts = vec!["a.example.com".to_string(), "ops@b.example.com:2222".to_string()];
    let config = Config::discover(dir.path(), None, &hosts).unwrap();

    assert_eq!(config.servers.len(), 2);
    let b = config.servers.last();
    assert_eq!(b.host, "b.example.com");
    assert_eq!(b.port, 2222);
    assert_eq!(b.user.as_deref(), Some("ops"));
}

#[test]
fn alternate_file_names_are_discovered() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join(".cutover")).unwrap();
    fs::write(dir.path().join(".cutover/config.yml"), MINIMAL).unwrap();

    let config = Config::discover(dir.path(), None, &[]).unwrap();
    assert_eq!(config.application, "blog");

    let empty = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::discover(empty.path(), None, &[]),
        Err(Error::ConfigNotFound(_))
    ));
}

#[test]
fn detailed_servers_and_roles() {
    let yaml = r#"
application: blog
repository: r
deploy_to: /srv/blog
deploy_via: checkout
use_sudo: true
admin_runner: root
command_timeout: 90s
servers:
  - host: web1
    roles: [web]
  - host: db1
    roles: [db]
    no_release: true
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.deploy_via, DeployVia::Checkout);
    assert!(config.use_sudo);
    assert_eq!(config.admin_runner.as_deref(), Some("root"));
    assert_eq!(config.command_timeout, Duration::from_secs(90));
    assert!(config.servers.last().no_release);
    assert!(config.servers.first().has_role("web"));
}

#[test]
fn dependencies_parse_into_check_specs() {
    let yaml = format!(
        "{MINIMAL}
dependencies:
  - location: remote
    kind: command
    name: convert
  - location: local
    kind: directory
    path: /opt/assets
    message: assets must be built first
  - location: remote
    kind: package
    manager: gem
    name: bundler
    version: 2.4.0
  - location: remote
    kind: match
    command: php -v
    pattern: PHP 8
"
    );
    let config = Config::from_yaml(&yaml).unwrap();

    let deps = &config.dependencies;
    assert_eq!(deps.len(), 4);
    assert_eq!(deps[0].location, Location::Remote);
    assert_eq!(
        deps[0].kind,
        CheckKind::Command {
            name: "convert".to_string()
        }
    );
    assert_eq!(deps[1].failure_message(), "assets must be built first");
    assert_eq!(
        deps[2].kind,
        CheckKind::Package {
            manager: PackageManager::Gem,
            name: "bundler".to_string(),
            version: Some("2.4.0".to_string()),
        }
    );
    assert_eq!(deps[3].failure_message(), "`php -v' did not match /PHP 8/");
}
