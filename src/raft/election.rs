//! Pure election logic.
//!
//! Everything here is a function of a [`NodeState`] snapshot and an input, so
//! the transition table can be exercised without timers or sockets. The
//! driver in `node.rs` and the handlers in `state.rs` apply the results under
//! the state lock.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::state::{HeartbeatOutcome, NodeRole, NodeState};

/// Events that move the election driver between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionEvent {
    /// Follower saw no heartbeat before its election timer fired.
    TimerExpired,
    /// Candidate is about to solicit votes and claims the next term.
    CandidacyStarted,
    /// Candidate collected a strict majority naming itself.
    ElectionWon,
    /// Candidate consulted every peer without reaching a majority.
    ElectionLost,
}

/// Transition table for driver-originated events.
///
/// | role      | event            | next                                   |
/// |-----------|------------------|----------------------------------------|
/// | Follower  | TimerExpired     | Candidate, same term, leader unchanged |
/// | Candidate | CandidacyStarted | Candidate, term + 1, leader unchanged  |
/// | Candidate | ElectionWon      | Leader, same term, leader = self       |
/// | Candidate | ElectionLost     | Follower, same term, leader unchanged  |
///
/// The term moves on every candidacy round, including one forced by a
/// heartbeat conflict that has already advanced it once.
///
/// Any other pairing is not a transition and yields `None`.
pub fn transition(current: &NodeState, self_id: &str, event: ElectionEvent) -> Option<NodeState> {
    match (current.role, event) {
        (NodeRole::Follower, ElectionEvent::TimerExpired) => Some(NodeState {
            current_term: current.current_term,
            role: NodeRole::Candidate,
            leader_id: current.leader_id.clone(),
        }),
        (NodeRole::Candidate, ElectionEvent::CandidacyStarted) => Some(NodeState {
            current_term: current.current_term + 1,
            role: NodeRole::Candidate,
            leader_id: current.leader_id.clone(),
        }),
        (NodeRole::Candidate, ElectionEvent::ElectionWon) => Some(NodeState {
            current_term: current.current_term,
            role: NodeRole::Leader,
            leader_id: Some(self_id.to_string()),
        }),
        (NodeRole::Candidate, ElectionEvent::ElectionLost) => Some(NodeState {
            current_term: current.current_term,
            role: NodeRole::Follower,
            leader_id: current.leader_id.clone(),
        }),
        _ => None,
    }
}

/// Decide how an inbound `Heartbeat(term, leader_id)` changes `current`.
pub fn heartbeat_transition(
    current: &NodeState,
    self_id: &str,
    term: u64,
    leader_id: &str,
) -> (HeartbeatOutcome, Option<NodeState>) {
    match term.cmp(&current.current_term) {
        Ordering::Less => (HeartbeatOutcome::Stale, None),
        Ordering::Equal if current.leader_id.as_deref() == Some(leader_id) => {
            (HeartbeatOutcome::Confirmed, None)
        }
        // Two claims for one term: trust neither and force a fresh election.
        Ordering::Equal => (
            HeartbeatOutcome::Conflict,
            Some(NodeState {
                current_term: current.current_term + 1,
                role: NodeRole::Candidate,
                leader_id: Some(self_id.to_string()),
            }),
        ),
        Ordering::Greater => (
            HeartbeatOutcome::Adopted,
            Some(NodeState {
                current_term: term,
                role: NodeRole::Follower,
                leader_id: Some(leader_id.to_string()),
            }),
        ),
    }
}

/// Name the node this respondent supports for a `RequestVote(term, candidate_id)`.
///
/// Granting support does not adopt the candidate's term; that only happens
/// once a heartbeat for the term arrives.
pub fn vote_opinion(current: &NodeState, term: u64, candidate_id: &str) -> Option<String> {
    if term > current.current_term {
        Some(candidate_id.to_string())
    } else {
        current.leader_id.clone()
    }
}

/// Strict majority of the full cluster, self included.
pub fn has_quorum(votes: usize, cluster_size: usize) -> bool {
    votes * 2 > cluster_size
}

/// Candidate-local count of which node each respondent named as leader.
#[derive(Debug, Clone)]
pub struct VoteTally {
    candidate_id: String,
    cluster_size: usize,
    counts: HashMap<String, usize>,
}

impl VoteTally {
    /// Start a tally with the candidate's own vote already counted.
    pub fn new(candidate_id: impl Into<String>, cluster_size: usize) -> Self {
        let candidate_id = candidate_id.into();
        let mut counts = HashMap::new();
        counts.insert(candidate_id.clone(), 1);
        Self {
            candidate_id,
            cluster_size,
            counts,
        }
    }

    /// Record one respondent's answer. `None` means it named nobody.
    pub fn record(&mut self, named: Option<&str>) {
        if let Some(name) = named.filter(|n| !n.is_empty()) {
            *self.counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    pub fn votes_for(&self, node_id: &str) -> usize {
        self.counts.get(node_id).copied().unwrap_or(0)
    }

    pub fn votes_for_candidate(&self) -> usize {
        self.votes_for(&self.candidate_id)
    }

    pub fn is_won(&self) -> bool {
        has_quorum(self.votes_for_candidate(), self.cluster_size)
    }
}
