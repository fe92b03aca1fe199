pub mod config;
pub mod network;
pub mod raft;

// Public exports
pub use config::{Config, PeerConfig};
pub use network::{HttpTransport, NetworkError};
pub use raft::{NodeRole, NodeState, Raft, RaftConfig, RaftError};
