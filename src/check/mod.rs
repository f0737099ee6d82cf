// ABOUTME: Preflight dependency checker.
// ABOUTME: Runs check specs locally or on every release host and aggregates the results.

mod spec;

pub use spec::{CheckKind, CheckSpec, Location, PackageManager};

use futures::future::join_all;
use regex::Regex;
use serde::Serialize;

use crate::deploy::DeployError;
use crate::executor::{Executor, TargetSet};
use spec::{PathKind, Probe};

/// Outcome of one check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub spec: CheckSpec,
    pub passed: bool,
    /// Remote hosts on which the check failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_hosts: Vec<String>,
}

impl CheckResult {
    /// Failure message, naming the failing hosts for remote checks.
    pub fn message(&self) -> String {
        let message = self.spec.failure_message();
        if self.failed_hosts.is_empty() {
            message
        } else {
            format!("{message} ({})", self.failed_hosts.join(", "))
        }
    }
}

/// Results of a set of checks. Passes iff every check passed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckSuite {
    pub results: Vec<CheckResult>,
}

impl CheckSuite {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// `Ok` when everything passed, otherwise every failure message.
    pub fn into_result(self) -> Result<Self, DeployError> {
        if self.passed() {
            return Ok(self);
        }
        Err(DeployError::DependencyCheckFailed {
            failures: self.failures().map(CheckResult::message).collect(),
        })
    }
}

/// Add the implied checks: every location with a gem package check also
/// needs the gem command itself.
pub fn with_implied(specs: &[CheckSpec], gem_command: &str) -> Vec<CheckSpec> {
    let mut expanded = Vec::with_capacity(specs.len());
    let mut gem_checked = Vec::new();

    for spec in specs {
        let is_gem = matches!(
            spec.kind,
            CheckKind::Package {
                manager: PackageManager::Gem,
                ..
            }
        );
        if is_gem && !gem_checked.contains(&spec.location) {
            gem_checked.push(spec.location);
            expanded.push(
                CheckSpec::new(
                    spec.location,
                    CheckKind::Command {
                        name: gem_command.to_string(),
                    },
                )
                .with_message(format!(
                    "`{gem_command}' command could not be found. Try setting gem_command"
                )),
            );
        }
        expanded.push(spec.clone());
    }

    expanded
}

/// Runs checks through an executor. Checks only probe; they never change
/// anything on the hosts.
#[derive(Debug, Clone, Copy)]
pub struct Checker<'a> {
    executor: &'a Executor,
    targets: &'a TargetSet,
    gem_command: &'a str,
}

impl<'a> Checker<'a> {
    pub fn new(executor: &'a Executor, targets: &'a TargetSet, gem_command: &'a str) -> Self {
        Self {
            executor,
            targets,
            gem_command,
        }
    }

    /// Run every check (plus implied ones) and collect the results in order.
    pub async fn run(&self, specs: &[CheckSpec]) -> CheckSuite {
        let specs = with_implied(specs, self.gem_command);
        let results = join_all(specs.into_iter().map(|spec| self.run_one(spec))).await;
        CheckSuite { results }
    }

    async fn run_one(&self, spec: CheckSpec) -> CheckResult {
        let probe = spec.probe(self.gem_command);
        let (passed, failed_hosts) = match (probe, spec.location) {
            (Probe::Path { path, want }, _) => (path_is(&path, want).await, Vec::new()),
            (Probe::Shell { command, pattern }, Location::Local) => {
                let passed = match self.executor.probe_local(&command, &[]).await {
                    Ok(output) => accepts(&output, pattern.as_deref()),
                    Err(e) => {
                        tracing::debug!("local check `{}' could not run: {}", command, e);
                        false
                    }
                };
                (passed, Vec::new())
            }
            (Probe::Shell { command, pattern }, Location::Remote) => {
                let failed: Vec<String> = self
                    .executor
                    .probe(&command, self.targets)
                    .await
                    .into_iter()
                    .filter_map(|(host, result)| {
                        let ok = match result {
                            Ok(output) => accepts(&output, pattern.as_deref()),
                            Err(e) => {
                                tracing::debug!(host = %host, "check `{}' could not run: {}", command, e);
                                false
                            }
                        };
                        (!ok).then_some(host)
                    })
                    .collect();
                (failed.is_empty(), failed)
            }
        };

        tracing::debug!(
            "check {} {:?}: {}",
            spec.location,
            spec.kind,
            if passed { "ok" } else { "failed" }
        );

        CheckResult {
            spec,
            passed,
            failed_hosts,
        }
    }
}

fn accepts(output: &crate::ssh::CommandOutput, pattern: Option<&str>) -> bool {
    if !output.success() {
        return false;
    }
    match pattern {
        None => true,
        Some(pattern) => match Regex::new(pattern) {
            Ok(re) => re.is_match(&output.stdout),
            Err(e) => {
                tracing::warn!("invalid check pattern /{}/: {}", pattern, e);
                false
            }
        },
    }
}

async fn path_is(path: &str, want: PathKind) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => match want {
            PathKind::Directory => meta.is_dir(),
            PathKind::File => meta.is_file(),
        },
        Err(_) => false,
    }
}
