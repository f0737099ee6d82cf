// ABOUTME: Operations on the live release: uploads, content links, maintenance page.
// ABOUTME: Also the read-only views used by `pending` and `releases`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{DeployError, Orchestrator};
use crate::executor::RoleFilter;
use crate::maintenance::{self, Notice};
use crate::release::{ReleaseName, join};
use crate::shell::quote_arg;
use crate::transaction::Transaction;

/// Directory under `shared/` that holds the maintenance page.
pub const SYSTEM_DIR: &str = "system";

/// Release set as seen from the primary host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseListing {
    pub releases: Vec<ReleaseName>,
    pub current: Option<ReleaseName>,
}

impl ReleaseListing {
    /// One release per line, the live one marked with `*`.
    pub fn render(&self) -> String {
        if self.releases.is_empty() {
            return "no releases deployed".to_string();
        }
        self.releases
            .iter()
            .map(|r| {
                let marker = if Some(r) == self.current.as_ref() { "*" } else { " " };
                format!("{marker} {r}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of `web disable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebDisabled {
    pub path: String,
    /// Suggested web server configuration.
    pub rules: String,
}

/// Split a comma-separated FILES value into patterns.
pub fn parse_file_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expand patterns relative to `base` into files, walking directories.
///
/// Returns `(local path, path relative to base)` pairs in sorted order.
pub fn expand_files(
    patterns: &[String],
    base: &Path,
) -> Result<Vec<(PathBuf, String)>, DeployError> {
    let mut files = BTreeMap::new();

    for pattern in patterns {
        let full = base.join(pattern);
        let matches = glob::glob(&full.to_string_lossy()).map_err(|e| {
            DeployError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            }
        })?;

        for entry in matches {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::debug!("skipping unreadable match: {}", e);
                    continue;
                }
            };
            if path.is_dir() {
                for file in WalkDir::new(&path)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|e| e.file_type().is_file())
                {
                    let file = file.into_path();
                    files.insert(relative_to(&file, base), file);
                }
            } else if path.is_file() {
                files.insert(relative_to(&path, base), path);
            }
        }
    }

    Ok(files.into_iter().map(|(rel, path)| (path, rel)).collect())
}

fn relative_to(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.to_string_lossy().trim_start_matches('/').to_string()
}

impl Orchestrator {
    /// Commits (or the diff) between the live revision and the configured
    /// branch, from the local repository.
    pub async fn pending(&self, diff: bool) -> Result<String, DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let revision = self.releases(&targets).current_revision().await?;
        if diff {
            self.scm.diff(&revision).await
        } else {
            let from = self.scm.next_revision(&revision);
            self.scm.log(&from).await
        }
    }

    /// Releases on the primary host and the one `current` points to.
    pub async fn release_listing(&self) -> Result<ReleaseListing, DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let releases = self.releases(&targets);
        let set = releases.list().await?;
        let current = releases.current_target().await?;
        Ok(ReleaseListing {
            releases: set.iter().cloned().collect(),
            current,
        })
    }

    /// Copy local files into the live release, keeping relative paths.
    ///
    /// Returns the relative paths uploaded.
    pub async fn upload(&self, patterns: &[String], base: &Path) -> Result<Vec<String>, DeployError> {
        let files = expand_files(patterns, base)?;
        if files.is_empty() {
            return Err(DeployError::NothingToUpload);
        }
        let targets = self.targets(&RoleFilter::releases())?;
        let current = self.paths.current();

        for (local, relative) in &files {
            let remote = join(&current, relative);
            let contents = tokio::fs::read(local).await?;
            let mode = tokio::fs::metadata(local).await?.permissions().mode() & 0o777;

            if let Some((parent, _)) = remote.rsplit_once('/') {
                self.executor
                    .run(&format!("mkdir -p {}", quote_arg(parent)), &targets)
                    .await?;
            }
            self.executor.put(&contents, &remote, mode, &targets).await?;
            tracing::debug!("uploaded {} to {}", local.display(), remote);
        }

        Ok(files.into_iter().map(|(_, rel)| rel).collect())
    }

    /// Link each sub-directory of the live release's content directories into
    /// the served content directory.
    pub async fn links(&self) -> Result<(), DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let content = &self.config.content_dir;
        let live = join(&self.paths.current(), content);
        let served = join(self.paths.deploy_to(), content);

        for dir in &self.config.link_dirs {
            let source = quote_arg(&join(&live, dir));
            let dest = quote_arg(&format!("{}/", join(&served, dir)));
            let command = format!(
                "if [ -d {source} ]; then mkdir -p {dest} && \
                 find {source} -mindepth 1 -maxdepth 1 -type d -exec ln -nfs {{}} {dest} \\; ; fi"
            );
            self.executor.run(&command, &targets).await?;
        }
        Ok(())
    }

    fn maintenance_page_path(&self) -> String {
        join(
            &self.paths.shared_child(SYSTEM_DIR),
            &format!("{}.html", self.config.maintenance_basename),
        )
    }

    /// Put the maintenance page on every web host.
    pub async fn web_disable(&self, notice: &Notice) -> Result<WebDisabled, DeployError> {
        let targets = self.targets(&RoleFilter::web())?;
        let path = self.maintenance_page_path();
        let page = self.page.render(notice);

        let mut tx = Transaction::started();
        let result = async {
            tx.on_rollback(
                "remove maintenance page",
                self.compensate(format!("rm -f {}", quote_arg(&path)), &targets),
            )?;
            tx.step("write maintenance page", async {
                let dir = self.paths.shared_child(SYSTEM_DIR);
                self.executor
                    .run(&format!("mkdir -p {}", quote_arg(&dir)), &targets)
                    .await?;
                self.executor
                    .put(page.as_bytes(), &path, 0o644, &targets)
                    .await?;
                Ok(())
            })
            .await?;
            tx.commit()
        }
        .await;
        self.finish(&tx, result)?;

        Ok(WebDisabled {
            rules: maintenance::rewrite_rules(&self.config.maintenance_basename),
            path,
        })
    }

    /// Remove the maintenance page from every web host.
    pub async fn web_enable(&self) -> Result<(), DeployError> {
        let targets = self.targets(&RoleFilter::web())?;
        let path = self.maintenance_page_path();
        self.executor
            .run(&format!("rm -f {}", quote_arg(&path)), &targets)
            .await?;
        Ok(())
    }
}
