mod config;
mod election;
mod error;
mod node;
mod rpc;
mod state;
mod timer;
mod transport;

pub use self::config::RaftConfig;
pub use self::election::{
    has_quorum, heartbeat_transition, transition, vote_opinion, ElectionEvent, VoteTally,
};
pub use self::error::RaftError;
pub use self::node::{bounded, CandidacyOutcome, RaftNode};
pub use self::rpc::{HeartbeatRequest, HeartbeatResponse, RpcHandler, VoteRequest, VoteResponse};
pub use self::state::{HeartbeatOutcome, NodeRole, NodeState, SharedState};
pub use self::timer::{ElectionTimer, HeartbeatSignal, TimerOutcome};
pub use self::transport::{LocalNetwork, LocalTransport, PeerTransport};

use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// One election participant: shared state, inbound handler and the driver.
pub struct Raft {
    config: RaftConfig,
    state: Arc<SharedState>,
    signal: Arc<HeartbeatSignal>,
    transport: Arc<dyn PeerTransport>,
}

/// Background tasks spawned by [`Raft::start`].
pub struct RaftTasks {
    pub driver: JoinHandle<()>,
    pub status: JoinHandle<()>,
}

impl RaftTasks {
    pub fn abort(&self) {
        self.driver.abort();
        self.status.abort();
    }
}

impl Raft {
    pub fn new(config: RaftConfig, transport: Arc<dyn PeerTransport>) -> Result<Self, RaftError> {
        config.validate()?;
        let state = Arc::new(SharedState::new(config.node_id.clone()));
        Ok(Self {
            config,
            state,
            signal: Arc::new(HeartbeatSignal::new()),
            transport,
        })
    }

    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    /// Handler that inbound RPCs (HTTP or in-process) are dispatched to.
    pub fn handler(&self) -> RpcHandler {
        RpcHandler::new(Arc::clone(&self.state), Arc::clone(&self.signal))
    }

    /// Spawn the election driver and the periodic status reporter.
    pub fn start(&self) -> RaftTasks {
        let node = RaftNode::new(
            self.config.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.signal),
            Arc::clone(&self.transport),
        );
        let driver = tokio::spawn(node.run());
        let status = tokio::spawn(report_status(
            Arc::clone(&self.state),
            self.config.status_interval(),
        ));
        RaftTasks { driver, status }
    }
}

/// Log `(role, term, leader)` every `period`. Advisory only.
pub async fn report_status(state: Arc<SharedState>, period: Duration) {
    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        let snap = state.read();
        info!(
            "node state: {} term: {} leader: {}",
            snap.role,
            snap.current_term,
            snap.leader_id.as_deref().unwrap_or("none")
        );
    }
}
