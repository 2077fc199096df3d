//! Consensus domain model: proposals and votes. Quorum arithmetic and the
//! finalization state machine live in `runtime::consensus`; this module
//! owns the data shape and the one invariant that's purely structural — at
//! most one vote per (proposal, voter).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub proposal_type: String,
    pub proposer: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    /// Frozen at creation time (`floor(registryCount / 2) + 1`, never
    /// recomputed) so a transient drop in registry count can't retroactively
    /// change the decision threshold.
    pub required_votes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: Uuid,
    pub voter: String,
    pub accept: bool,
    pub signature_tag: String,
    pub timestamp: DateTime<Utc>,
}

/// A proposal plus the votes cast on it so far, as tracked by the
/// consensus manager while the proposal is active.
#[derive(Debug, Clone)]
pub struct ProposalRecord {
    pub proposal: Proposal,
    votes: HashMap<String, Vote>,
}

impl ProposalRecord {
    pub fn new(proposal: Proposal) -> Self {
        Self {
            proposal,
            votes: HashMap::new(),
        }
    }

    /// Records `vote` unless `voter` has already voted on this proposal.
    /// Returns `false` on a duplicate so the caller can log-and-drop per
    /// spec's vote-validation rule.
    pub fn record_vote(&mut self, vote: Vote) -> bool {
        if self.votes.contains_key(&vote.voter) {
            return false;
        }
        self.votes.insert(vote.voter.clone(), vote);
        true
    }

    pub fn votes(&self) -> impl Iterator<Item = &Vote> {
        self.votes.values()
    }

    pub fn yes_count(&self) -> usize {
        self.votes.values().filter(|v| v.accept).count()
    }

    pub fn no_count(&self) -> usize {
        self.votes.values().filter(|v| !v.accept).count()
    }

    pub fn total_votes(&self) -> usize {
        self.votes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(voter: &str, accept: bool) -> Vote {
        Vote {
            proposal_id: Uuid::nil(),
            voter: voter.to_string(),
            accept,
            signature_tag: "sig".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn record() -> ProposalRecord {
        ProposalRecord::new(Proposal {
            id: Uuid::nil(),
            proposal_type: "upgrade".to_string(),
            proposer: "coordinator".to_string(),
            data: Value::Null,
            created_at: Utc::now(),
            required_votes: 3,
        })
    }

    #[test]
    fn duplicate_voter_is_rejected() {
        let mut record = record();
        assert!(record.record_vote(vote("v1", true)));
        assert!(!record.record_vote(vote("v1", false)));
        assert_eq!(record.total_votes(), 1);
    }

    #[test]
    fn tallies_yes_and_no_separately() {
        let mut record = record();
        record.record_vote(vote("v1", true));
        record.record_vote(vote("v2", true));
        record.record_vote(vote("v3", false));
        assert_eq!(record.yes_count(), 2);
        assert_eq!(record.no_count(), 1);
        assert_eq!(record.total_votes(), 3);
    }
}
