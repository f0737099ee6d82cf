// ABOUTME: Server list entries accepted in the config file.
// ABOUTME: Handles "user@host:port" shorthand alongside detailed server maps.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::ServerConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum ServerEntry {
    Simple(String),
    Detailed(ServerConfig),
}

impl ServerEntry {
    fn into_server_config(self) -> Result<ServerConfig, String> {
        match self {
            ServerEntry::Simple(s) => ServerConfig::parse(&s),
            ServerEntry::Detailed(c) => Ok(c),
        }
    }
}

/// Convert raw entries, returning `None` for an empty list.
pub(super) fn into_servers(
    entries: Vec<ServerEntry>,
) -> Result<Option<NonEmpty<ServerConfig>>, String> {
    let servers = entries
        .into_iter()
        .map(ServerEntry::into_server_config)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NonEmpty::from_vec(servers))
}
