// ABOUTME: Declarative preflight check definitions.
// ABOUTME: Each check is a location plus a closed set of kinds, read straight from cutover.yml.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shell::quote_arg;

/// Where a check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// The machine running cutover.
    Local,
    /// Every release host of the operation.
    Remote,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local => write!(f, "local"),
            Location::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Deb,
    Rpm,
    Gem,
}

/// What a check verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckKind {
    /// An executable is on the PATH.
    Command { name: String },
    Directory { path: String },
    File { path: String },
    Writable { path: String },
    /// A package is installed, optionally at a given version.
    Package {
        manager: PackageManager,
        name: String,
        #[serde(default)]
        version: Option<String>,
    },
    /// A command's output matches a regular expression.
    Match { command: String, pattern: String },
}

/// One preflight check.
///
/// ```yaml
/// dependencies:
///   - { location: remote, kind: command, name: rsync }
///   - { location: remote, kind: package, manager: gem, name: tzinfo, version: ">=0.3.3" }
///   - { location: local, kind: directory, path: wordpress, message: "run from the project root" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub location: Location,
    #[serde(flatten)]
    pub kind: CheckKind,
    /// Replaces the default failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// How a check is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Probe {
    /// Passes when the command exits 0 and, if a pattern is given, its
    /// stdout matches.
    Shell {
        command: String,
        pattern: Option<String>,
    },
    /// Local filesystem lookup.
    Path { path: String, want: PathKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathKind {
    Directory,
    File,
}

impl CheckSpec {
    pub fn new(location: Location, kind: CheckKind) -> Self {
        Self {
            location,
            kind,
            message: None,
        }
    }

    pub fn local(kind: CheckKind) -> Self {
        Self::new(Location::Local, kind)
    }

    pub fn remote(kind: CheckKind) -> Self {
        Self::new(Location::Remote, kind)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The message shown when this check fails.
    pub fn failure_message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        match &self.kind {
            CheckKind::Command { name } => format!("`{name}' could not be found in the path"),
            CheckKind::Directory { path } => format!("`{path}' is not a directory"),
            CheckKind::File { path } => format!("`{path}' is not a file"),
            CheckKind::Writable { path } => format!("`{path}' is not writable"),
            CheckKind::Package {
                manager,
                name,
                version,
            } => {
                let noun = match manager {
                    PackageManager::Gem => "gem",
                    PackageManager::Deb | PackageManager::Rpm => "package",
                };
                match version {
                    Some(v) => format!("{noun} `{name}' {v} could not be found"),
                    None => format!("{noun} `{name}' could not be found"),
                }
            }
            CheckKind::Match { command, pattern } => {
                format!("`{command}' did not match /{pattern}/")
            }
        }
    }

    /// Translate the check into a probe. `gem_command` is the executable used
    /// for gem checks.
    pub(crate) fn probe(&self, gem_command: &str) -> Probe {
        let shell = |command: String| Probe::Shell {
            command,
            pattern: None,
        };
        match (&self.kind, self.location) {
            (CheckKind::Command { name }, _) => {
                shell(format!("command -v {} >/dev/null 2>&1", quote_arg(name)))
            }
            (CheckKind::Directory { path }, Location::Local) => Probe::Path {
                path: path.clone(),
                want: PathKind::Directory,
            },
            (CheckKind::File { path }, Location::Local) => Probe::Path {
                path: path.clone(),
                want: PathKind::File,
            },
            (CheckKind::Directory { path }, Location::Remote) => {
                shell(format!("test -d {}", quote_arg(path)))
            }
            (CheckKind::File { path }, Location::Remote) => {
                shell(format!("test -f {}", quote_arg(path)))
            }
            (CheckKind::Writable { path }, _) => shell(format!("test -w {}", quote_arg(path))),
            (
                CheckKind::Package {
                    manager,
                    name,
                    version,
                },
                _,
            ) => shell(package_query(*manager, name, version.as_deref(), gem_command)),
            (CheckKind::Match { command, pattern }, _) => Probe::Shell {
                command: command.clone(),
                pattern: Some(pattern.clone()),
            },
        }
    }
}

fn package_query(
    manager: PackageManager,
    name: &str,
    version: Option<&str>,
    gem_command: &str,
) -> String {
    let name = quote_arg(name);
    match (manager, version) {
        (PackageManager::Deb, None) => {
            format!("dpkg -s {name} 2>/dev/null | grep -q '^Status: install ok installed'")
        }
        (PackageManager::Deb, Some(v)) => format!(
            "dpkg -s {name} 2>/dev/null | grep -q '^Status: install ok installed' && \
             dpkg -s {name} | grep -q {}",
            quote_arg(&format!("^Version: {v}"))
        ),
        (PackageManager::Rpm, None) => format!("rpm -q {name} >/dev/null 2>&1"),
        (PackageManager::Rpm, Some(v)) => {
            format!("rpm -q {name} 2>/dev/null | grep -q -- {}", quote_arg(v))
        }
        (PackageManager::Gem, None) => format!("{gem_command} list -i {name} >/dev/null"),
        (PackageManager::Gem, Some(v)) => {
            format!("{gem_command} list -i {name} -v {} >/dev/null", quote_arg(v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flattened_yaml_entries() {
        let yaml = r#"
- location: remote
  kind: command
  name: rsync
- location: local
  kind: package
  manager: gem
  name: tzinfo
  version: ">=0.3.3"
- location: remote
  kind: directory
  path: /u/depot/files
  message: depot is missing
"#;
        let specs: Vec<CheckSpec> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            specs[0],
            CheckSpec::remote(CheckKind::Command {
                name: "rsync".to_string()
            })
        );
        assert_eq!(
            specs[1].kind,
            CheckKind::Package {
                manager: PackageManager::Gem,
                name: "tzinfo".to_string(),
                version: Some(">=0.3.3".to_string()),
            }
        );
        assert_eq!(specs[2].failure_message(), "depot is missing");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let yaml = "location: remote\nkind: telepathy\nname: x\n";
        assert!(serde_yaml::from_str::<CheckSpec>(yaml).is_err());
    }

    #[test]
    fn default_messages() {
        let dir = CheckSpec::remote(CheckKind::Directory {
            path: "/srv/app/releases".to_string(),
        });
        assert_eq!(dir.failure_message(), "`/srv/app/releases' is not a directory");

        let pkg = CheckSpec::remote(CheckKind::Package {
            manager: PackageManager::Deb,
            name: "git".to_string(),
            version: None,
        });
        assert_eq!(pkg.failure_message(), "package `git' could not be found");
    }

    #[test]
    fn local_paths_use_the_filesystem_and_remote_paths_use_test() {
        let path = "/srv/app".to_string();
        let local = CheckSpec::local(CheckKind::Directory { path: path.clone() });
        let remote = CheckSpec::remote(CheckKind::Directory { path });

        assert_eq!(
            local.probe("gem"),
            Probe::Path {
                path: "/srv/app".to_string(),
                want: PathKind::Directory
            }
        );
        assert_eq!(
            remote.probe("gem"),
            Probe::Shell {
                command: "test -d /srv/app".to_string(),
                pattern: None
            }
        );
    }

    #[test]
    fn gem_probe_uses_configured_command() {
        let spec = CheckSpec::remote(CheckKind::Package {
            manager: PackageManager::Gem,
            name: "tzinfo".to_string(),
            version: Some(">=0.3.3".to_string()),
        });
        let Probe::Shell { command, .. } = spec.probe("/opt/ruby/bin/gem") else {
            panic!("expected a shell probe");
        };
        assert_eq!(
            command,
            "/opt/ruby/bin/gem list -i tzinfo -v '>=0.3.3' >/dev/null"
        );
    }
}
