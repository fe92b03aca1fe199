use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Follower,
    Candidate,
    Leader,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Follower => "Follower",
            NodeRole::Candidate => "Candidate",
            NodeRole::Leader => "Leader",
        };
        f.write_str(name)
    }
}

/// Snapshot of the election triple. Always read and written as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub current_term: u64,
    pub role: NodeRole,
    pub leader_id: Option<String>,
}

impl NodeState {
    pub fn initial() -> Self {
        Self {
            current_term: 0,
            role: NodeRole::Follower,
            leader_id: None,
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, NodeRole::Leader)
    }
}

/// Outcome of applying an inbound heartbeat to the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Term below ours; nothing changed.
    Stale,
    /// Same term, same leader; election timer should be reset.
    Confirmed,
    /// Same term, different leader; we advanced the term and became candidate.
    Conflict,
    /// Newer term; we adopted it and follow the sender.
    Adopted,
}

impl HeartbeatOutcome {
    /// Whether the follower's election timer should be told about this heartbeat.
    pub fn resets_timer(self) -> bool {
        !matches!(self, HeartbeatOutcome::Stale)
    }
}

/// Mutex-guarded owner of the node's term, role and known leader.
///
/// Inbound RPC handlers and the election driver both go through this type, so
/// no observer ever sees a term paired with a stale leader.
#[derive(Debug)]
pub struct SharedState {
    self_id: String,
    inner: Mutex<NodeState>,
}

impl SharedState {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            inner: Mutex::new(NodeState::initial()),
        }
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn read(&self) -> NodeState {
        self.lock().clone()
    }

    /// Replace the triple with `next` only if it still equals `expected`.
    ///
    /// Returns `false` when another writer got there first.
    pub fn compare_and_advance(&self, expected: &NodeState, next: NodeState) -> bool {
        let mut guard = self.lock();
        if *guard != *expected {
            return false;
        }
        self.store(&mut guard, next);
        true
    }

    /// Apply an inbound `Heartbeat(term, leader_id)`.
    pub fn handle_heartbeat(&self, term: u64, leader_id: &str) -> HeartbeatOutcome {
        let mut guard = self.lock();
        let (outcome, next) =
            super::election::heartbeat_transition(&guard, &self.self_id, term, leader_id);
        if let Some(next) = next {
            self.store(&mut guard, next);
        }
        outcome
    }

    /// Answer an inbound `RequestVote(term, candidate_id)`. Never mutates state.
    pub fn vote_opinion(&self, term: u64, candidate_id: &str) -> Option<String> {
        let guard = self.lock();
        super::election::vote_opinion(&guard, term, candidate_id)
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        // Writers assert before storing, so a poisoned guard still holds a valid triple.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, guard: &mut MutexGuard<'_, NodeState>, next: NodeState) {
        assert!(
            next.current_term >= guard.current_term,
            "term regressed from {} to {}",
            guard.current_term,
            next.current_term
        );
        assert!(
            !next.is_leader() || next.leader_id.as_deref() == Some(self.self_id.as_str()),
            "node {} is leader but records {:?} as leader",
            self.self_id,
            next.leader_id
        );
        **guard = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_as_follower_in_term_zero() {
        let state = SharedState::new("n1");
        let snap = state.read();
        assert_eq!(snap.current_term, 0);
        assert_eq!(snap.role, NodeRole::Follower);
        assert!(snap.leader_id.is_none());
    }

    #[test]
    fn compare_and_advance_rejects_outdated_expectation() {
        let state = SharedState::new("n1");
        let before = state.read();
        state.handle_heartbeat(3, "n2");

        let next = NodeState {
            current_term: 1,
            role: NodeRole::Candidate,
            leader_id: None,
        };
        assert!(!state.compare_and_advance(&before, next));
        assert_eq!(state.read().current_term, 3);
    }

    #[test]
    fn compare_and_advance_replaces_whole_triple() {
        let state = SharedState::new("n1");
        let before = state.read();
        let next = NodeState {
            current_term: 1,
            role: NodeRole::Leader,
            leader_id: Some("n1".to_string()),
        };
        assert!(state.compare_and_advance(&before, next.clone()));
        assert_eq!(state.read(), next);
    }

    #[test]
    #[should_panic(expected = "term regressed")]
    fn term_regression_fails_fast() {
        let state = SharedState::new("n1");
        state.handle_heartbeat(5, "n2");
        let current = state.read();
        let next = NodeState {
            current_term: 4,
            ..current.clone()
        };
        state.compare_and_advance(&current, next);
    }

    #[test]
    #[should_panic(expected = "is leader but records")]
    fn leader_must_name_itself() {
        let state = SharedState::new("n1");
        let current = state.read();
        let next = NodeState {
            current_term: 1,
            role: NodeRole::Leader,
            leader_id: Some("n2".to_string()),
        };
        state.compare_and_advance(&current, next);
    }

    #[test]
    fn role_display_matches_names() {
        assert_eq!(NodeRole::Follower.to_string(), "Follower");
        assert_eq!(NodeRole::Candidate.to_string(), "Candidate");
        assert_eq!(NodeRole::Leader.to_string(), "Leader");
    }
}
