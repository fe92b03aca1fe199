//! Outbound side of the election RPCs.
//!
//! [`PeerTransport`] is what the driver talks to. The HTTP implementation lives
//! in `crate::network::client`; [`LocalNetwork`] wires handlers together
//! in-process so clusters can be simulated without sockets.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::rpc::{HeartbeatRequest, HeartbeatResponse, RpcHandler, VoteRequest, VoteResponse};
use crate::network::NetworkError;

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send `Heartbeat` to `peer_id`.
    async fn heartbeat(
        &self,
        peer_id: &str,
        request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, NetworkError>;

    /// Send `RequestVote` to `peer_id`.
    async fn request_vote(
        &self,
        peer_id: &str,
        request: VoteRequest,
    ) -> Result<VoteResponse, NetworkError>;
}

/// In-process cluster: every registered node's handler, plus a set of cut links.
#[derive(Default)]
pub struct LocalNetwork {
    handlers: RwLock<HashMap<String, RpcHandler>>,
    cut: RwLock<HashSet<(String, String)>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, node_id: &str, handler: RpcHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_id.to_string(), handler);
    }

    /// Transport as seen from `node_id`.
    pub fn transport_for(self: &Arc<Self>, node_id: &str) -> LocalTransport {
        LocalTransport {
            from: node_id.to_string(),
            network: Arc::clone(self),
        }
    }

    /// Drop all traffic between `node_id` and every other node.
    pub fn isolate(&self, node_id: &str) {
        let others: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|id| id.as_str() != node_id)
            .cloned()
            .collect();
        let mut cut = self.cut.write().unwrap_or_else(PoisonError::into_inner);
        for other in others {
            cut.insert((node_id.to_string(), other.clone()));
            cut.insert((other, node_id.to_string()));
        }
    }

    pub fn heal(&self) {
        self.cut.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn route(&self, from: &str, to: &str) -> Result<RpcHandler, NetworkError> {
        let link = (from.to_string(), to.to_string());
        if self.cut.read().unwrap_or_else(PoisonError::into_inner).contains(&link) {
            return Err(NetworkError::ConnectionError(format!("{from} cannot reach {to}")));
        }
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(to)
            .cloned()
            .ok_or_else(|| NetworkError::ConnectionError(format!("unknown peer {to}")))
    }
}

pub struct LocalTransport {
    from: String,
    network: Arc<LocalNetwork>,
}

#[async_trait]
impl PeerTransport for LocalTransport {
    async fn heartbeat(
        &self,
        peer_id: &str,
        request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, NetworkError> {
        let handler = self.network.route(&self.from, peer_id)?;
        Ok(handler.heartbeat(&request))
    }

    async fn request_vote(
        &self,
        peer_id: &str,
        request: VoteRequest,
    ) -> Result<VoteResponse, NetworkError> {
        let handler = self.network.route(&self.from, peer_id)?;
        Ok(handler.request_vote(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raft::{HeartbeatSignal, SharedState};

    fn register(net: &Arc<LocalNetwork>, id: &str) -> Arc<SharedState> {
        let state = Arc::new(SharedState::new(id));
        net.register(id, RpcHandler::new(Arc::clone(&state), Arc::new(HeartbeatSignal::new())));
        state
    }

    fn ask(term: u64, called_by: &str) -> VoteRequest {
        VoteRequest {
            term,
            called_by: called_by.to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_to_registered_peer() {
        let net = LocalNetwork::new();
        register(&net, "n1");
        let n2 = register(&net, "n2");

        let t = net.transport_for("n1");
        let request = HeartbeatRequest {
            term: 1,
            leader: "n1".to_string(),
        };
        let resp = t.heartbeat("n2", request).await.expect("heartbeat");
        assert!(resp.ok);
        assert_eq!(n2.read().leader_id.as_deref(), Some("n1"));
    }

    #[tokio::test]
    async fn isolated_node_is_unreachable_until_healed() {
        let net = LocalNetwork::new();
        register(&net, "n1");
        register(&net, "n2");
        net.isolate("n1");

        let t = net.transport_for("n2");
        let req = ask(1, "n2");
        assert!(t.request_vote("n1", req.clone()).await.is_err());

        net.heal();
        assert!(t.request_vote("n1", req).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_peer_is_an_error() {
        let net = LocalNetwork::new();
        register(&net, "n1");
        let t = net.transport_for("n1");
        let err = t.request_vote("ghost", ask(1, "n1")).await.unwrap_err();
        assert!(matches!(err, NetworkError::ConnectionError(_)));
    }
}
