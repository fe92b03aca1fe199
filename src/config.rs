use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::raft::RaftConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid peer spec '{0}', expected id=address")]
    InvalidPeer(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node_id: String,
    pub listen_address: String,
    pub peers: Vec<PeerConfig>,
    pub election_timeout_min_ms: u64,
    pub election_timeout_max_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub rpc_timeout_ms: u64,
    pub status_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub id: String,
    pub address: String,
}

impl Default for Config {
    fn default() -> Self {
        let timings = RaftConfig::new("");
        Self {
            node_id: String::new(),
            listen_address: "127.0.0.1:8000".to_string(),
            peers: (0..3)
                .map(|i| PeerConfig {
                    id: i.to_string(),
                    address: format!("127.0.0.1:{}", 8000 + i),
                })
                .collect(),
            election_timeout_min_ms: timings.election_timeout_min,
            election_timeout_max_ms: timings.election_timeout_max,
            heartbeat_interval_ms: timings.heartbeat_interval,
            rpc_timeout_ms: timings.rpc_timeout,
            status_interval_ms: timings.status_interval,
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Replace the peer list from a comma-separated `id=address` list.
    pub fn set_peers_from_str(&mut self, spec: &str) -> Result<(), ConfigError> {
        self.peers = parse_peers(spec)?;
        Ok(())
    }

    /// Peers matching this node by id or by listen address are left out.
    pub fn raft_config(&self) -> RaftConfig {
        let mut raft = RaftConfig::new(&self.node_id);
        let own = endpoint(&self.listen_address);
        for peer in self.peers.iter().filter(|p| endpoint(&p.address) != own) {
            raft.add_peer(&peer.id, &peer.address);
        }
        raft.election_timeout_min = self.election_timeout_min_ms;
        raft.election_timeout_max = self.election_timeout_max_ms;
        raft.heartbeat_interval = self.heartbeat_interval_ms;
        raft.rpc_timeout = self.rpc_timeout_ms;
        raft.status_interval = self.status_interval_ms;
        raft
    }
}

/// `(host, port)` with the scheme dropped and loopback spellings folded together.
fn endpoint(address: &str) -> (String, String) {
    let bare = address
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/');
    let (host, port) = bare.rsplit_once(':').unwrap_or((bare, ""));
    let host = match host {
        "" | "localhost" | "127.0.0.1" | "0.0.0.0" | "[::1]" | "[::]" => "local",
        other => other,
    };
    (host.to_ascii_lowercase(), port.to_string())
}

pub fn parse_peers(spec: &str) -> Result<Vec<PeerConfig>, ConfigError> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((id, address)) if !id.is_empty() && !address.is_empty() => Ok(PeerConfig {
                id: id.to_string(),
                address: address.to_string(),
            }),
            _ => Err(ConfigError::InvalidPeer(entry.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_default_values_match_local_three_node_cluster() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_address, "127.0.0.1:8000");
        assert_eq!(cfg.peers.len(), 3);
        assert_eq!(cfg.election_timeout_min_ms, 150);
        assert_eq!(cfg.election_timeout_max_ms, 300);
    }

    #[test]
    fn raft_config_excludes_self_from_peers() {
        let cfg = Config {
            node_id: "1".to_string(),
            listen_address: "127.0.0.1:8001".to_string(),
            ..Config::default()
        };
        let raft = cfg.raft_config();
        assert_eq!(raft.node_id, "1");
        assert_eq!(raft.peers.len(), 2);
        assert!(!raft.peers.contains_key("1"));
        assert_eq!(raft.cluster_size(), 3);
    }

    #[test]
    fn raft_config_excludes_peer_listening_on_own_address() {
        let cfg = Config {
            node_id: "node1".to_string(),
            ..Config::default()
        };
        let raft = cfg.raft_config();
        assert_eq!(raft.cluster_size(), 3);
        assert!(raft.peers.values().all(|a| a != "127.0.0.1:8000"));

        let peers = "a=http://127.0.0.1:8000,b=http://localhost:8001/,c=10.0.0.3:8001";
        let cfg = Config {
            node_id: "node2".to_string(),
            listen_address: "localhost:8001".to_string(),
            peers: parse_peers(peers).unwrap(),
            ..Config::default()
        };
        let mut peers: Vec<_> = cfg.raft_config().peers.into_keys().collect();
        peers.sort();
        assert_eq!(peers, vec!["a", "c"]);
    }

    fn peer(id: &str, address: &str) -> PeerConfig {
        PeerConfig {
            id: id.to_string(),
            address: address.to_string(),
        }
    }

    #[test]
    fn parse_peers_accepts_id_address_pairs() {
        let peers = parse_peers("a=127.0.0.1:1, b=http://host:2,").unwrap();
        assert_eq!(peers, vec![peer("a", "127.0.0.1:1"), peer("b", "http://host:2")]);
    }

    #[test]
    fn parse_peers_rejects_bad_entries() {
        assert!(matches!(parse_peers("a"), Err(ConfigError::InvalidPeer(_))));
        assert!(matches!(parse_peers("=addr"), Err(ConfigError::InvalidPeer(_))));
        assert!(matches!(parse_peers("a="), Err(ConfigError::InvalidPeer(_))));
    }

    #[test]
    fn load_reads_partial_json_file() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"node_id": "n2", "listen_address": "0.0.0.0:9001",
                "peers": [{{"id": "n1", "address": "10.0.0.1:9000"}}],
                "heartbeat_interval_ms": 20}}"#
        )
        .expect("write");

        let cfg = Config::load(file.path()).expect("load");
        assert_eq!(cfg.node_id, "n2");
        assert_eq!(cfg.listen_address, "0.0.0.0:9001");
        assert_eq!(cfg.peers.len(), 1);
        assert_eq!(cfg.heartbeat_interval_ms, 20);
        assert_eq!(cfg.election_timeout_max_ms, 300);
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, "not json").expect("write");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse(_))));
    }
}
