use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;

use super::RaftError;

#[derive(Debug, Clone)]
pub struct RaftConfig {
    pub node_id: String,
    pub peers: HashMap<String, String>, // node_id -> address
    pub election_timeout_min: u64,      // in milliseconds, inclusive
    pub election_timeout_max: u64,      // in milliseconds, exclusive
    pub heartbeat_interval: u64,        // in milliseconds
    pub rpc_timeout: u64,               // in milliseconds, per outbound call
    pub status_interval: u64,           // in milliseconds
    pub rng_seed: Option<u64>,
}

impl RaftConfig {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            peers: HashMap::new(),
            election_timeout_min: 150,
            election_timeout_max: 300,
            heartbeat_interval: 50,
            rpc_timeout: 100,
            status_interval: 1000,
            rng_seed: None,
        }
    }

    /// Register a peer. Entries naming this node are skipped.
    pub fn add_peer(&mut self, peer_id: &str, address: &str) {
        if peer_id == self.node_id {
            return;
        }
        self.peers.insert(peer_id.to_string(), address.to_string());
    }

    /// Peers plus self.
    pub fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }

    pub fn election_timeout_range(&self) -> Range<Duration> {
        Duration::from_millis(self.election_timeout_min)
            ..Duration::from_millis(self.election_timeout_max)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval)
    }

    pub fn validate(&self) -> Result<(), RaftError> {
        if self.node_id.is_empty() {
            return Err(RaftError::InvalidConfig("node id must not be empty".to_string()));
        }
        if self.election_timeout_min >= self.election_timeout_max {
            return Err(RaftError::InvalidConfig(format!(
                "election timeout range [{}, {}) is empty",
                self.election_timeout_min, self.election_timeout_max
            )));
        }
        if self.heartbeat_interval == 0 || self.rpc_timeout == 0 {
            return Err(RaftError::InvalidConfig(
                "heartbeat interval and rpc timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
