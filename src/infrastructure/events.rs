//! Crate-wide event bus. Grounded on the teacher's
//! `services::event_bus::EventBus` (broadcast channel + monotonic sequence
//! numbers) but narrowed to the closed, typed event set this runtime emits
//! instead of the teacher's large `EventPayload` enum — and with no
//! persistence layer, since cross-process durability is an explicit
//! non-goal here.

use crate::domain::models::agent::{AgentIdentity, AgentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

/// The closed set of events the orchestrator fans out to external
/// subscribers (spec §4.1), plus `taskCancelled` (implied by the ordering
/// guarantee in §5 but not itself named in the fan-out list) and the mesh's
/// `runStopped`, which subsystems need internally even though it isn't one
/// of the eleven externally-named events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum OrchestrationEvent {
    AgentRegistered {
        identity: AgentIdentity,
    },
    AgentUnregistered {
        identity: AgentIdentity,
    },
    AgentStatusChanged {
        identity: AgentIdentity,
        old_status: AgentStatus,
        new_status: AgentStatus,
    },
    TaskSubmitted {
        task_id: Uuid,
    },
    TaskAssigned {
        task_id: Uuid,
        agent_id: String,
    },
    TaskCompleted {
        task_id: Uuid,
    },
    TaskFailed {
        task_id: Uuid,
        reason: String,
    },
    TaskCancelled {
        task_id: Uuid,
    },
    TopologyUpdated {
        node_count: usize,
        connection_count: usize,
        avg_connections_per_node: f64,
    },
    RunStopped {
        reason: String,
        duration_ms: u64,
    },
    ProposalCreated {
        proposal_id: Uuid,
    },
    ConsensusReached {
        proposal_id: Uuid,
        accepted: bool,
        votes: usize,
    },
    HealthCheck {
        overall: crate::domain::models::resource::CheckStatus,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub event: OrchestrationEvent,
}

/// Central event bus. One instance is owned by the orchestrator and shared
/// (by cloning the sender side) with every subsystem that publishes; every
/// subscriber gets its own `broadcast::Receiver`.
pub struct EventBus {
    sender: broadcast::Sender<Envelope>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: OrchestrationEvent) {
        let envelope = Envelope {
            id: EventId::new(),
            sequence: SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst)),
            timestamp: Utc::now(),
            event,
        };
        // A send error just means there are currently no subscribers; the
        // publisher never blocks or fails on that.
        let _ = self.sender.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_events_carry_increasing_sequence_numbers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(OrchestrationEvent::TaskSubmitted { task_id: Uuid::nil() });
        bus.publish(OrchestrationEvent::TaskSubmitted { task_id: Uuid::nil() });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(second.sequence.0 > first.sequence.0);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.publish(OrchestrationEvent::TaskSubmitted { task_id: Uuid::nil() });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
