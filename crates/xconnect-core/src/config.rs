//! Node configuration and the static peer table.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Liveness window of a registry entry.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(90);

/// Cadence of heartbeats sent by an executor node.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Bound on a dispatcher-to-executor hop.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(15);

/// Bound on a peer-to-peer hop.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on a heartbeat post.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid peer alias '{0}': must be non-empty without whitespace or '@'")]
    InvalidAlias(String),
    #[error("Invalid address for peer '{alias}': {reason}")]
    InvalidAddress { alias: String, reason: String },
    #[error("Invalid peer definition '{0}': expected alias=url")]
    InvalidPeerDefinition(String),
    #[error("Peer table has no alias for this node")]
    MissingAlias,
    #[error("Agent profile '{}' not found", .0.display())]
    ProfileNotFound(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse peer table: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Whether `alias` can name a peer in `alias@command` syntax.
#[must_use]
pub fn is_valid_alias(alias: &str) -> bool {
    !alias.is_empty() && !alias.chars().any(|c| c.is_whitespace() || c == '@')
}

/// Parse and validate an executor address.
///
/// # Errors
/// Returns the reason the address is not an absolute http(s) URL.
pub fn parse_address(address: &str) -> Result<Url, String> {
    let url = Url::parse(address).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err("missing host".to_string()),
        other => Err(format!("unsupported scheme '{other}'")),
    }
}

/// Static mapping from peer alias to network address.
///
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerTable {
    peers: BTreeMap<String, Url>,
}

impl PeerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer.
    ///
    /// # Errors
    /// Returns error if the alias or address is invalid.
    pub fn insert(&mut self, alias: &str, address: &str) -> Result<(), ConfigError> {
        if !is_valid_alias(alias) {
            return Err(ConfigError::InvalidAlias(alias.to_string()));
        }
        let url = parse_address(address).map_err(|reason| ConfigError::InvalidAddress {
            alias: alias.to_string(),
            reason,
        })?;
        self.peers.insert(alias.to_string(), url);
        Ok(())
    }

    /// Add a peer from an `alias=url` definition.
    ///
    /// # Errors
    /// Returns error if the definition is malformed.
    pub fn insert_definition(&mut self, definition: &str) -> Result<(), ConfigError> {
        let (alias, address) = definition
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidPeerDefinition(definition.to_string()))?;
        self.insert(alias.trim(), address.trim())
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&Url> {
        self.peers.get(alias)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct PeerFile {
    alias: Option<String>,
    #[serde(default)]
    peers: BTreeMap<String, String>,
}

/// Identity and peer table of a peer-routing node.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// This node's own alias.
    pub alias: String,
    pub peers: PeerTable,
}

impl PeerConfig {
    /// Build a config, validating the node's alias.
    ///
    /// # Errors
    /// Returns error if the alias is invalid.
    pub fn new(alias: impl Into<String>, peers: PeerTable) -> Result<Self, ConfigError> {
        let alias = alias.into();
        if !is_valid_alias(&alias) {
            return Err(ConfigError::InvalidAlias(alias));
        }
        Ok(Self { alias, peers })
    }

    /// Parse a TOML peer file.
    ///
    /// `alias_override` takes precedence over the file's `alias` key.
    ///
    /// # Errors
    /// Returns error if the file is malformed or any entry is invalid.
    pub fn from_toml_str(contents: &str, alias_override: Option<&str>) -> Result<Self, ConfigError> {
        let file: PeerFile = toml::from_str(contents)?;
        let alias = alias_override
            .map(str::to_string)
            .or(file.alias)
            .ok_or(ConfigError::MissingAlias)?;

        let mut peers = PeerTable::new();
        for (peer_alias, address) in &file.peers {
            peers.insert(peer_alias, address)?;
        }
        Self::new(alias, peers)
    }

    /// Load a TOML peer file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is invalid.
    pub fn load(path: &Path, alias_override: Option<&str>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, alias_override)
    }

    /// Peers other than this node.
    pub fn remote_aliases(&self) -> impl Iterator<Item = &str> {
        self.peers.aliases().filter(move |a| *a != self.alias)
    }
}

/// Check that the agent profile exists.
///
/// # Errors
/// Returns [`ConfigError::ProfileNotFound`] if it does not.
pub fn require_profile(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::ProfileNotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_validation() {
        assert!(is_valid_alias("machineA"));
        assert!(is_valid_alias("box-1.lan"));
        assert!(!is_valid_alias(""));
        assert!(!is_valid_alias("echo user"));
        assert!(!is_valid_alias("a@b"));
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("http://192.168.9.9:5001").is_ok());
        assert!(parse_address("https://example.ngrok-free.app").is_ok());
        assert!(parse_address("ftp://host").is_err());
        assert!(parse_address("192.168.9.9:5001").is_err());
        assert!(parse_address("<machine-b-ip>").is_err());
    }

    #[test]
    fn test_peer_definition() {
        let mut table = PeerTable::new();
        table.insert_definition("machineB = http://10.0.0.2:5001").unwrap();
        assert_eq!(
            table.get("machineB").map(Url::as_str),
            Some("http://10.0.0.2:5001/")
        );
        assert!(matches!(
            table.insert_definition("no-equals"),
            Err(ConfigError::InvalidPeerDefinition(_))
        ));
    }

    #[test]
    fn test_from_toml() {
        let cfg = PeerConfig::from_toml_str(
            r#"
            alias = "machineA"
            [peers]
            machineA = "http://192.168.9.9:5001"
            machineB = "http://192.168.9.155:5001"
            "#,
            None,
        )
        .unwrap();
        assert_eq!(cfg.alias, "machineA");
        assert_eq!(cfg.peers.len(), 2);
        assert_eq!(cfg.remote_aliases().collect::<Vec<_>>(), vec!["machineB"]);
    }

    #[test]
    fn test_from_toml_alias_override_and_missing() {
        let contents = "[peers]\nb = \"http://b:1\"\n";
        let cfg = PeerConfig::from_toml_str(contents, Some("a")).unwrap();
        assert_eq!(cfg.alias, "a");
        assert!(matches!(
            PeerConfig::from_toml_str(contents, None),
            Err(ConfigError::MissingAlias)
        ));
    }

    #[test]
    fn test_from_toml_rejects_placeholder_address() {
        let contents = "alias = \"a\"\n[peers]\nb = \"http://<machine-b-ip>:5001\"\n";
        assert!(matches!(
            PeerConfig::from_toml_str(contents, None),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_load_and_require_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.toml");
        std::fs::write(&path, "alias = \"a\"\n").unwrap();
        let cfg = PeerConfig::load(&path, None).unwrap();
        assert!(cfg.peers.is_empty());

        assert!(require_profile(&path).is_ok());
        assert!(matches!(
            require_profile(&dir.path().join("agentrc")),
            Err(ConfigError::ProfileNotFound(_))
        ));
    }
}
