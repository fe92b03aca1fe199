use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::state::{HeartbeatOutcome, SharedState};
use super::timer::HeartbeatSignal;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub term: u64,
    pub leader: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub term: u64,
    pub called_by: String,
}

/// `leader` is empty when the respondent knows no leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub leader: String,
}

impl VoteResponse {
    pub fn named(&self) -> Option<&str> {
        Some(self.leader.as_str()).filter(|l| !l.is_empty())
    }
}

/// Server-side handling of the two election RPCs, independent of transport.
#[derive(Debug, Clone)]
pub struct RpcHandler {
    state: Arc<SharedState>,
    signal: Arc<HeartbeatSignal>,
}

impl RpcHandler {
    pub fn new(state: Arc<SharedState>, signal: Arc<HeartbeatSignal>) -> Self {
        Self { state, signal }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn heartbeat(&self, req: &HeartbeatRequest) -> HeartbeatResponse {
        let outcome = self.state.handle_heartbeat(req.term, &req.leader);
        match outcome {
            HeartbeatOutcome::Stale => {
                debug!("Dropping stale heartbeat from {} for term {}", req.leader, req.term)
            }
            HeartbeatOutcome::Confirmed => {}
            HeartbeatOutcome::Conflict => info!(
                "Conflicting leader {} for term {}, forcing a new election",
                req.leader, req.term
            ),
            HeartbeatOutcome::Adopted => {
                info!("Term advanced to {}, following {}", req.term, req.leader)
            }
        }
        if outcome.resets_timer() {
            self.signal.raise();
        }
        HeartbeatResponse { ok: true }
    }

    pub fn request_vote(&self, req: &VoteRequest) -> VoteResponse {
        let leader = self.state.vote_opinion(req.term, &req.called_by).unwrap_or_default();
        debug!(
            "Vote request from {} for term {}, supporting {:?}",
            req.called_by, req.term, leader
        );
        VoteResponse { leader }
    }
}
