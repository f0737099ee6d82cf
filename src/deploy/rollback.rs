// ABOUTME: Manual rollback and retention cleanup.
// ABOUTME: Repoints current to the previous release and prunes releases outside the window.

use serde::Serialize;

use super::{DeployError, Orchestrator};
use crate::diagnostics::Warning;
use crate::executor::RoleFilter;
use crate::release::ReleaseName;
use crate::shell::{quote_all, quote_arg};

/// What a rollback did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolledBack {
    /// Release `current` now points to.
    pub restored: ReleaseName,
    /// Release that was live before and has been removed. `None` when
    /// `current` already pointed at the restored release.
    pub removed: Option<ReleaseName>,
}

/// What a cleanup did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cleanup {
    pub kept: usize,
    pub removed: Vec<ReleaseName>,
}

impl Orchestrator {
    /// Point `current` at the previous release, then delete the release that
    /// was live before the rollback.
    ///
    /// # Errors
    ///
    /// [`DeployError::NoPriorRelease`] with fewer than two releases; nothing
    /// is changed on the hosts in that case.
    pub async fn rollback(&self) -> Result<RolledBack, DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let releases = self.releases(&targets);

        let set = releases.list().await?;
        let (Some(newest), Some(previous)) = (set.current(), set.previous()) else {
            return Err(DeployError::NoPriorRelease);
        };
        let live = releases
            .current_target()
            .await?
            .unwrap_or_else(|| newest.clone());

        // revision
        self.point_current(previous, &targets).await?;
        tracing::info!("current -> {} (was {})", previous, live);

        if live == *previous {
            tracing::info!("{} was already live, nothing to remove", live);
            return Ok(RolledBack {
                restored: previous.clone(),
                removed: None,
            });
        }

        // cleanup: never delete what current now points to
        let current = quote_arg(&self.paths.current());
        let doomed = quote_arg(&self.paths.release(&live));
        self.executor
            .run(
                &format!(
                    "if [ \"$(readlink {current})\" != {doomed} ]; then rm -rf {doomed}; fi"
                ),
                &targets,
            )
            .await?;

        Ok(RolledBack {
            restored: previous.clone(),
            removed: Some(live),
        })
    }

    /// Delete releases older than the newest `keep_releases`.
    ///
    /// The release `current` points to is kept even when it falls outside
    /// the window.
    pub async fn cleanup(&self) -> Result<Cleanup, DeployError> {
        let targets = self.targets(&RoleFilter::releases())?;
        let releases = self.releases(&targets);

        let set = releases.list().await?;
        let keep = self.config.keep_releases;
        if keep >= set.len() {
            self.warn(Warning::nothing_to_clean("no old releases to clean up"));
            return Ok(Cleanup {
                kept: set.len(),
                removed: Vec::new(),
            });
        }

        tracing::info!("keeping {} of {} deployed releases", keep, set.len());
        let live = releases.current_target().await?;
        let expired = set.expired(keep, live.as_ref());
        if let Some(live) = &live
            && set.expired(keep, None).contains(live)
        {
            tracing::info!("keeping {} outside the window: current points to it", live);
        }

        if !expired.is_empty() {
            let dirs: Vec<String> = expired.iter().map(|r| self.paths.release(r)).collect();
            self.executor
                .try_sudo(&format!("rm -rf {}", quote_all(&dirs)), &targets)
                .await?;
        }

        Ok(Cleanup {
            kept: set.len() - expired.len(),
            removed: expired,
        })
    }
}
