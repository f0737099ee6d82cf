// ABOUTME: Git backend.
// ABOUTME: Resolves refs with ls-remote and builds clone/fetch/reset commands for release hosts.

use async_trait::async_trait;

use super::{ScmCommands, ScmQuery};
use crate::deploy::DeployError;
use crate::executor::Executor;
use crate::shell::quote_arg;

const COMMAND: &str = "git";

#[derive(Debug, Clone)]
pub struct Git {
    repository: String,
    shallow_clone: Option<u32>,
    executor: Executor,
}

impl Git {
    pub fn new(repository: impl Into<String>, executor: Executor) -> Self {
        Self {
            repository: repository.into(),
            shallow_clone: None,
            executor,
        }
    }

    pub fn shallow_clone(mut self, depth: Option<u32>) -> Self {
        self.shallow_clone = depth;
        self
    }

    async fn run_local(&self, command: &str) -> Result<String, DeployError> {
        Ok(self
            .executor
            .run_local_with_env(command, &[("LC_ALL", "C")])
            .await?)
    }
}

fn is_commit_id(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Pick the id for `reference` out of `git ls-remote` output.
///
/// A line matches when its ref, with the `refs/<kind>/` prefix removed,
/// equals the reference (so `main` matches `refs/heads/main`).
fn find_in_ls_remote(output: &str, reference: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (id, name) = line.split_once('\t')?;
        let short = match name.strip_prefix("refs/") {
            Some(rest) => rest.split_once('/').map_or(rest, |(_, tail)| tail),
            None => name,
        };
        (short.trim() == reference && is_commit_id(id.trim())).then(|| id.trim().to_string())
    })
}

#[async_trait]
impl ScmQuery for Git {
    async fn query_revision(&self, reference: &str) -> Result<String, DeployError> {
        if is_commit_id(reference) {
            return Ok(reference.to_string());
        }

        let listing = self
            .run_local(&format!(
                "{COMMAND} ls-remote {} {}",
                quote_arg(&self.repository),
                quote_arg(reference)
            ))
            .await?;
        if let Some(id) = find_in_ls_remote(&listing, reference) {
            tracing::debug!("resolved {} to {}", reference, id);
            return Ok(id);
        }

        // Not a remote ref; an abbreviated id may still expand locally.
        let local = self
            .run_local(&format!("{COMMAND} rev-parse --revs-only {}", quote_arg(reference)))
            .await
            .unwrap_or_default();
        let local = local.trim();
        if is_commit_id(local) {
            return Ok(local.to_string());
        }

        Err(DeployError::UnresolvedRevision {
            reference: reference.to_string(),
            repository: self.repository.clone(),
        })
    }

    async fn diff(&self, since: &str) -> Result<String, DeployError> {
        self.run_local(&format!("{COMMAND} diff {}", quote_arg(since)))
            .await
    }

    async fn log(&self, since: &str) -> Result<String, DeployError> {
        self.run_local(&format!("{COMMAND} log {}..", quote_arg(since)))
            .await
    }
}

impl ScmCommands for Git {
    fn command(&self) -> &str {
        COMMAND
    }

    fn checkout(&self, revision: &str, destination: &str) -> String {
        let depth = self
            .shallow_clone
            .map(|d| format!(" --depth {d}"))
            .unwrap_or_default();
        let destination = quote_arg(destination);
        format!(
            "{COMMAND} clone -q{depth} {} {destination} && cd {destination} && {COMMAND} checkout -q -b deploy {}",
            quote_arg(&self.repository),
            quote_arg(revision),
        )
    }

    fn export(&self, revision: &str, destination: &str) -> String {
        format!(
            "{} && rm -Rf {}",
            self.checkout(revision, destination),
            quote_arg(&format!("{destination}/.git"))
        )
    }

    fn sync(&self, revision: &str, destination: &str) -> String {
        format!(
            "cd {} && {COMMAND} fetch -q origin && {COMMAND} fetch --tags -q origin && \
             {COMMAND} reset -q --hard {} && {COMMAND} clean -q -d -x -f",
            quote_arg(destination),
            quote_arg(revision),
        )
    }
}
