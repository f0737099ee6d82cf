// ABOUTME: Server configuration for release hosts.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@host:port".

use crate::ssh::SessionConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,
    /// Hosts that take part in role tasks but never hold releases.
    #[serde(default)]
    pub no_release: bool,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default = "default_trust_first_connection")]
    pub trust_first_connection: bool,
}

fn default_port() -> u16 {
    22
}

fn default_roles() -> Vec<String> {
    vec!["web".to_string(), "app".to_string()]
}

fn default_trust_first_connection() -> bool {
    true
}

impl ServerConfig {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("server address cannot be empty".to_string());
        }

        // [user@]host[:port]
        let (user_part, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, port)
            }
            None => (rest, default_port()),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(ServerConfig {
            host: host.to_string(),
            port,
            user: user_part.filter(|u| !u.is_empty()).map(str::to_string),
            roles: default_roles(),
            no_release: false,
            key_path: None,
            trust_first_connection: default_trust_first_connection(),
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Build the SSH session settings for this server.
    pub fn ssh_session_config(&self, command_timeout: Duration) -> SessionConfig {
        let user = self
            .user
            .clone()
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_else(|_| "root".to_string()));

        let config = SessionConfig::new(&self.host, user)
            .port(self.port)
            .trust_on_first_use(self.trust_first_connection)
            .command_timeout(command_timeout);

        match &self.key_path {
            Some(path) => config.key_path(path),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_host_and_port() {
        let server = ServerConfig::parse("deploy@web1.example.com:2222").unwrap();
        assert_eq!(server.host, "web1.example.com");
        assert_eq!(server.port, 2222);
        assert_eq!(server.user.as_deref(), Some("deploy"));
        assert!(server.has_role("web"));
        assert!(!server.no_release);
    }

    #[test]
    fn rejects_bad_port() {
        let err = ServerConfig::parse("web1:ssh").unwrap_err();
        assert!(err.contains("invalid port"));
    }

    #[test]
    fn rejects_empty_host() {
        assert!(ServerConfig::parse("deploy@:22").is_err());
        assert!(ServerConfig::parse("   ").is_err());
    }
}
