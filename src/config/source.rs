// ABOUTME: Source control and acquisition strategy selectors.
// ABOUTME: Maps the `scm` and `deploy_via` settings onto closed enums.

use serde::Deserialize;
use std::fmt;

/// Source control system the repository lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scm {
    #[default]
    Git,
}

/// How a new release's files are materialised on the hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployVia {
    /// Fresh clone into the release directory.
    Checkout,
    /// Fresh clone with the `.git` directory stripped.
    Export,
    /// Keep a clone in `shared/cached-copy` and copy it into each release.
    #[default]
    RemoteCache,
}

impl fmt::Display for Scm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scm::Git => write!(f, "git"),
        }
    }
}

impl fmt::Display for DeployVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployVia::Checkout => "checkout",
            DeployVia::Export => "export",
            DeployVia::RemoteCache => "remote_cache",
        };
        write!(f, "{name}")
    }
}
