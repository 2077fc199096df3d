//! Consensus Manager: propose/vote/finalize over the registry's current
//! membership. Grounded on the teacher's broadcast-plus-timeout shape used
//! elsewhere in the runtime for per-item deadlines.

use crate::domain::error::ConsensusError;
use crate::domain::models::consensus::{Proposal, ProposalRecord, Vote};
use crate::infrastructure::events::{EventBus, OrchestrationEvent};
use crate::runtime::registry::AgentRegistry;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizationReason {
    Accepted,
    Rejected,
    Exhausted,
}

pub struct ConsensusManager {
    active: RwLock<HashMap<Uuid, ProposalRecord>>,
    registry: Arc<AgentRegistry>,
    events: Arc<EventBus>,
    min_votes: usize,
    timeout: Duration,
}

impl ConsensusManager {
    pub fn new(registry: Arc<AgentRegistry>, events: Arc<EventBus>, min_votes: usize, timeout_ms: u64) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            registry,
            events,
            min_votes,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Freezes `required_votes = max(floor(registryCount / 2) + 1, min_votes)`
    /// at creation time so it never shifts under the proposal's feet.
    pub async fn propose(self: &Arc<Self>, proposal_type: impl Into<String>, proposer: impl Into<String>, data: Value) -> Uuid {
        let registry_count = self.registry.count().await;
        let required_votes = (registry_count / 2 + 1).max(self.min_votes);

        let proposal = Proposal {
            id: Uuid::new_v4(),
            proposal_type: proposal_type.into(),
            proposer: proposer.into(),
            data,
            created_at: Utc::now(),
            required_votes,
        };
        let id = proposal.id;

        self.active.write().await.insert(id, ProposalRecord::new(proposal));
        self.events.publish(OrchestrationEvent::ProposalCreated { proposal_id: id });

        let manager = Arc::clone(self);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            manager.expire(id).await;
        });

        id
    }

    /// Unknown proposal or duplicate voter: logs a warning and drops the
    /// vote rather than erroring, per the vote-validation rule.
    pub async fn vote(&self, vote: Vote) {
        let registry_count = self.registry.count().await;
        let finalized = {
            let mut active = self.active.write().await;
            let Some(record) = active.get_mut(&vote.proposal_id) else {
                warn!(proposal_id = %vote.proposal_id, "vote on unknown or already-finalized proposal, dropping");
                return;
            };
            if !record.record_vote(vote.clone()) {
                warn!(proposal_id = %vote.proposal_id, voter = %vote.voter, "duplicate vote, dropping");
                return;
            }
            self.evaluate(record, registry_count)
        };

        if let Some(reason) = finalized {
            self.finalize(vote.proposal_id, reason).await;
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Proposal> {
        self.active.read().await.get(&id).map(|r| r.proposal.clone())
    }

    pub async fn list_active(&self) -> Vec<Proposal> {
        self.active.read().await.values().map(|r| r.proposal.clone()).collect()
    }

    pub async fn votes_for(&self, id: Uuid) -> Option<(usize, usize)> {
        self.active.read().await.get(&id).map(|r| (r.yes_count(), r.no_count()))
    }

    fn evaluate(&self, record: &ProposalRecord, registry_count: usize) -> Option<FinalizationReason> {
        let required = record.proposal.required_votes;
        if record.yes_count() >= required {
            Some(FinalizationReason::Accepted)
        } else if record.no_count() >= required {
            Some(FinalizationReason::Rejected)
        } else if record.total_votes() >= registry_count {
            Some(FinalizationReason::Exhausted)
        } else {
            None
        }
    }

    async fn finalize(&self, id: Uuid, reason: FinalizationReason) {
        let mut active = self.active.write().await;
        let Some(record) = active.remove(&id) else {
            return;
        };
        drop(active);

        let accepted = reason == FinalizationReason::Accepted;
        self.events.publish(OrchestrationEvent::ConsensusReached {
            proposal_id: id,
            accepted,
            votes: record.total_votes(),
        });
    }

    async fn expire(&self, id: Uuid) {
        let should_finalize = {
            let active = self.active.read().await;
            active.contains_key(&id)
        };
        if should_finalize {
            self.finalize(id, FinalizationReason::Exhausted).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<ConsensusManager> {
        let events = Arc::new(EventBus::new(64));
        let registry = Arc::new(AgentRegistry::new(Arc::clone(&events), 90_000));
        Arc::new(ConsensusManager::new(registry, events, 1, 30_000))
    }

    fn vote(proposal_id: Uuid, voter: &str, accept: bool) -> Vote {
        Vote {
            proposal_id,
            voter: voter.to_string(),
            accept,
            signature_tag: "sig".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn propose_freezes_required_votes_at_floor_plus_one() {
        let manager = manager();
        let id = manager.propose("upgrade", "coordinator", Value::Null).await;
        let proposal = manager.get(id).await.unwrap();
        // Empty registry: floor(0/2)+1 = 1, matches min_votes=1.
        assert_eq!(proposal.required_votes, 1);
    }

    #[tokio::test]
    async fn single_yes_vote_finalizes_accepted_with_min_votes_one() {
        let mut rx = {
            let events = Arc::new(EventBus::new(64));
            let registry = Arc::new(AgentRegistry::new(Arc::clone(&events), 90_000));
            let manager = Arc::new(ConsensusManager::new(registry, Arc::clone(&events), 1, 30_000));
            let rx = events.subscribe();
            let id = manager.propose("upgrade", "coordinator", Value::Null).await;
            manager.vote(vote(id, "v1", true)).await;
            rx
        };

        // Drain events looking for ConsensusReached.
        let mut accepted = None;
        while let Ok(envelope) = rx.try_recv() {
            if let OrchestrationEvent::ConsensusReached { accepted: a, .. } = envelope.event {
                accepted = Some(a);
            }
        }
        assert_eq!(accepted, Some(true));
    }

    #[tokio::test]
    async fn duplicate_voter_does_not_double_count() {
        let manager = manager();
        let id = manager.propose("upgrade", "coordinator", Value::Null).await;
        manager.vote(vote(id, "v1", true)).await;
        manager.vote(vote(id, "v1", true)).await;
        // Already finalized after the first vote (min_votes=1), so the
        // second vote hits the unknown-proposal path and is dropped too.
        assert!(manager.get(id).await.is_none());
    }

    #[tokio::test]
    async fn vote_on_unknown_proposal_is_dropped_without_panic() {
        let manager = manager();
        manager.vote(vote(Uuid::new_v4(), "v1", true)).await;
    }
}
