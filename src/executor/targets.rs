// ABOUTME: Deployment target sets resolved per operation.
// ABOUTME: Filters configured servers by role and by the no_release flag.

use std::fmt;

use super::error::ExecError;
use crate::config::ServerConfig;

/// Which servers an operation applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFilter {
    /// Only servers having at least one of these roles. Empty means any role.
    pub roles: Vec<String>,
    /// Skip servers flagged `no_release`.
    pub except_no_release: bool,
}

impl RoleFilter {
    /// Hosts that hold release directories.
    pub fn releases() -> Self {
        Self {
            roles: Vec::new(),
            except_no_release: true,
        }
    }

    /// Release-holding hosts with the web role.
    pub fn web() -> Self {
        Self {
            roles: vec!["web".to_string()],
            except_no_release: true,
        }
    }

    pub fn matches(&self, server: &ServerConfig) -> bool {
        if self.except_no_release && server.no_release {
            return false;
        }
        self.roles.is_empty() || self.roles.iter().any(|r| server.has_role(r))
    }
}

impl fmt::Display for RoleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.roles.is_empty() {
            write!(f, "any role")?;
        } else {
            write!(f, "roles [{}]", self.roles.join(", "))?;
        }
        if self.except_no_release {
            write!(f, " (excluding no_release hosts)")?;
        }
        Ok(())
    }
}

/// Hosts participating in one operation. Resolved fresh each time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    servers: Vec<ServerConfig>,
}

impl TargetSet {
    /// Select the servers matching `filter`. Fails if none match.
    pub fn resolve<'a, I>(servers: I, filter: &RoleFilter) -> Result<Self, ExecError>
    where
        I: IntoIterator<Item = &'a ServerConfig>,
    {
        let servers: Vec<_> = servers
            .into_iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();

        if servers.is_empty() {
            return Err(ExecError::NoTargets {
                filter: filter.to_string(),
            });
        }

        Ok(Self { servers })
    }

    /// The host queries (listing, reading markers) are answered by.
    pub fn primary(&self) -> &ServerConfig {
        &self.servers[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter()
    }

    pub fn hosts(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.host.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
