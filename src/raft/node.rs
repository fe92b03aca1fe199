use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info};
use tokio::time::{sleep, timeout};

use super::election::{transition, ElectionEvent, VoteTally};
use super::rpc::{HeartbeatRequest, VoteRequest};
use super::timer::{ElectionTimer, HeartbeatSignal, TimerOutcome};
use super::transport::PeerTransport;
use super::{NodeRole, NodeState, RaftConfig, SharedState};
use crate::network::NetworkError;

/// Result of one candidacy round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidacyOutcome {
    Won { term: u64, votes: usize },
    Lost { term: u64, votes: usize },
    /// The node was no longer the candidate it started as (a heartbeat moved it on).
    Superseded,
}

/// The election driver: runs the behaviour for whatever role the node is in.
pub struct RaftNode {
    config: RaftConfig,
    state: Arc<SharedState>,
    transport: Arc<dyn PeerTransport>,
    timer: ElectionTimer,
}

impl RaftNode {
    pub fn new(
        config: RaftConfig,
        state: Arc<SharedState>,
        signal: Arc<HeartbeatSignal>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        let timer = ElectionTimer::new(config.election_timeout_range(), config.rng_seed, signal);
        Self {
            config,
            state,
            transport,
            timer,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.node_id
    }

    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn is_leader(&self) -> bool {
        self.state.read().is_leader()
    }

    /// Drive the state machine until the task is dropped.
    pub async fn run(mut self) {
        info!(
            "Election driver for {} started with {} peers",
            self.id(),
            self.config.peers.len()
        );
        loop {
            self.step().await;
        }
    }

    /// Run one pass of the current role's behaviour.
    pub async fn step(&mut self) {
        let snapshot = self.state.read();
        match snapshot.role {
            NodeRole::Follower => self.follow(snapshot).await,
            NodeRole::Candidate => {
                self.run_candidacy().await;
            }
            NodeRole::Leader => {
                self.broadcast_heartbeats().await;
                sleep(self.config.heartbeat_interval()).await;
            }
        }
    }

    async fn follow(&mut self, snapshot: NodeState) {
        if self.timer.wait().await == TimerOutcome::Reset {
            return;
        }
        self.on_election_timeout(&snapshot);
    }

    /// Follower timer fired: become candidate. The term moves when the
    /// candidacy round starts.
    ///
    /// Returns `false` if the state moved on since `snapshot` was taken.
    pub fn on_election_timeout(&self, snapshot: &NodeState) -> bool {
        let Some(next) = transition(snapshot, self.id(), ElectionEvent::TimerExpired) else {
            return false;
        };
        if self.state.compare_and_advance(snapshot, next) {
            info!("Election timeout in term {}, becoming candidate", snapshot.current_term);
            true
        } else {
            false
        }
    }

    /// Claim the next term, solicit votes for it and apply the result.
    pub async fn run_candidacy(&self) -> CandidacyOutcome {
        let entry = self.state.read();
        let Some(snapshot) = transition(&entry, self.id(), ElectionEvent::CandidacyStarted) else {
            return CandidacyOutcome::Superseded;
        };
        if !self.state.compare_and_advance(&entry, snapshot.clone()) {
            return CandidacyOutcome::Superseded;
        }
        let term = snapshot.current_term;
        info!("Starting election for term {term}");
        let cluster_size = self.config.cluster_size();
        let mut tally = VoteTally::new(self.id(), cluster_size);

        let mut pending: FuturesUnordered<_> = self
            .config
            .peers
            .keys()
            .map(|peer| {
                let request = VoteRequest {
                    term,
                    called_by: self.id().to_string(),
                };
                async move {
                    let result = self
                        .with_deadline(self.transport.request_vote(peer, request))
                        .await;
                    (peer, result)
                }
            })
            .collect();

        while !tally.is_won() {
            match pending.next().await {
                Some((_peer, Ok(response))) => tally.record(response.named()),
                Some((peer, Err(e))) => debug!("RequestVote to {peer} failed: {e}"),
                None => break,
            }
        }

        let votes = tally.votes_for_candidate();
        let won = tally.is_won();
        let event = if won {
            ElectionEvent::ElectionWon
        } else {
            ElectionEvent::ElectionLost
        };
        let Some(next) = transition(&snapshot, self.id(), event) else {
            return CandidacyOutcome::Superseded;
        };
        if !self.state.compare_and_advance(&snapshot, next) {
            info!("State changed while electing for term {term}, abandoning candidacy");
            return CandidacyOutcome::Superseded;
        }

        if won {
            info!("Election won with {votes}/{cluster_size} votes, leading term {term}");
            CandidacyOutcome::Won { term, votes }
        } else {
            info!("Election lost with {votes}/{cluster_size} votes in term {term}");
            CandidacyOutcome::Lost { term, votes }
        }
    }

    /// Send one round of heartbeats. Returns how many peers acknowledged.
    pub async fn broadcast_heartbeats(&self) -> usize {
        let snapshot = self.state.read();
        if !snapshot.is_leader() {
            return 0;
        }
        let term = snapshot.current_term;

        let calls = self.config.peers.keys().map(|peer| async move {
            // Stop as soon as an inbound message has demoted us.
            let current = self.state.read();
            if !current.is_leader() || current.current_term != term {
                return false;
            }
            let request = HeartbeatRequest {
                term,
                leader: self.id().to_string(),
            };
            match self.with_deadline(self.transport.heartbeat(peer, request)).await {
                Ok(_) => true,
                Err(e) => {
                    debug!("Heartbeat to {peer} failed: {e}");
                    false
                }
            }
        });

        join_all(calls).await.into_iter().filter(|acked| *acked).count()
    }

    async fn with_deadline<T>(
        &self,
        call: impl Future<Output = Result<T, NetworkError>>,
    ) -> Result<T, NetworkError> {
        bounded(self.config.rpc_timeout(), call).await
    }
}

/// Await `call` for at most `limit`; an overrun counts as a failed call.
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, NetworkError>>,
) -> Result<T, NetworkError> {
    timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(NetworkError::Timeout))
}
