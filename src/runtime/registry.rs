//! Agent Registry: the single source of truth for agent status. Grounded
//! on the teacher's `ResourceMonitor` for the ticker/broadcast/shutdown
//! shape (`tokio::select!` over an interval and a shutdown signal) and on
//! `domain::models::agent` for the record shape itself.

use crate::domain::error::AgentError;
use crate::domain::models::agent::{AgentIdentity, AgentKind, AgentRecord, AgentStatus};
use crate::infrastructure::events::{EventBus, OrchestrationEvent};
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const LIVENESS_SCAN_INTERVAL: Duration = Duration::from_secs(30);
const IDLE_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
const IDLE_HEARTBEAT_STALE_AFTER_SECS: i64 = 45;

#[derive(Default)]
struct RegistryState {
    records: HashMap<AgentIdentity, AgentRecord>,
    by_kind: HashMap<AgentKind, HashSet<AgentIdentity>>,
}

impl RegistryState {
    fn index_insert(&mut self, identity: AgentIdentity) {
        self.by_kind.entry(identity.kind).or_default().insert(identity);
    }

    fn index_remove(&mut self, identity: &AgentIdentity) {
        if let Some(set) = self.by_kind.get_mut(&identity.kind) {
            set.remove(identity);
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStatus {
    pub total: usize,
    pub by_kind: HashMap<AgentKind, usize>,
}

pub struct AgentRegistry {
    state: RwLock<RegistryState>,
    events: Arc<EventBus>,
    staleness_threshold_ms: u64,
    shutdown_tx: broadcast::Sender<()>,
}

impl AgentRegistry {
    pub fn new(events: Arc<EventBus>, staleness_threshold_ms: u64) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            state: RwLock::new(RegistryState::default()),
            events,
            staleness_threshold_ms,
            shutdown_tx,
        }
    }

    /// Idempotent: registering an id already present is a no-op warning.
    pub async fn register(&self, record: AgentRecord) {
        let identity = record.identity.clone();
        let mut state = self.state.write().await;
        if state.records.contains_key(&identity) {
            warn!(agent_id = %identity.id, "register is a no-op: agent already present");
            return;
        }
        state.index_insert(identity.clone());
        state.records.insert(identity.clone(), record);
        drop(state);
        self.events.publish(OrchestrationEvent::AgentRegistered { identity });
    }

    /// Idempotent: unregistering an unknown id is a no-op warning.
    pub async fn unregister(&self, identity: &AgentIdentity) {
        let mut state = self.state.write().await;
        if state.records.remove(identity).is_none() {
            warn!(agent_id = %identity.id, "unregister is a no-op: agent not present");
            return;
        }
        state.index_remove(identity);
        drop(state);
        self.events.publish(OrchestrationEvent::AgentUnregistered {
            identity: identity.clone(),
        });
    }

    /// No transition is rejected — the scheduler relies on force-setting
    /// Busy/Idle directly. Both old and new status are carried in the
    /// emitted event.
    pub async fn update_status(&self, identity: &AgentIdentity, status: AgentStatus) -> Result<(), AgentError> {
        let old_status = {
            let mut state = self.state.write().await;
            let record = state
                .records
                .get_mut(identity)
                .ok_or_else(|| AgentError::NotFound(identity.id.clone()))?;
            let old = record.status;
            record.set_status(status);
            old
        };
        self.events.publish(OrchestrationEvent::AgentStatusChanged {
            identity: identity.clone(),
            old_status,
            new_status: status,
        });
        Ok(())
    }

    /// `meta` is accepted for parity with the heartbeat contract but not
    /// otherwise inspected — only `lastUpdatedAt` is load-bearing for
    /// liveness.
    pub async fn report_heartbeat(&self, identity: &AgentIdentity, _meta: Option<Value>) -> Result<(), AgentError> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(identity)
            .ok_or_else(|| AgentError::NotFound(identity.id.clone()))?;
        record.touch();
        Ok(())
    }

    pub async fn get(&self, identity: &AgentIdentity) -> Option<AgentRecord> {
        self.state.read().await.records.get(identity).cloned()
    }

    pub async fn list_by_kind(&self, kind: AgentKind) -> Vec<AgentRecord> {
        let state = self.state.read().await;
        state
            .by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|id| state.records.get(id).cloned())
            .collect()
    }

    pub async fn list_by_capability(&self, name: &str) -> Vec<AgentRecord> {
        let state = self.state.read().await;
        state
            .records
            .values()
            .filter(|r| r.capabilities.iter().any(|c| c.name == name))
            .cloned()
            .collect()
    }

    pub async fn list_available(&self) -> Vec<AgentRecord> {
        let state = self.state.read().await;
        state
            .records
            .values()
            .filter(|r| r.status.is_available())
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn status(&self) -> RegistryStatus {
        let state = self.state.read().await;
        let mut by_kind = HashMap::new();
        for (kind, ids) in &state.by_kind {
            by_kind.insert(*kind, ids.len());
        }
        RegistryStatus {
            total: state.records.len(),
            by_kind,
        }
    }

    /// Precondition: status in {Idle, Running}. On success transitions to
    /// Busy; otherwise errors `AgentUnavailable` without mutating anything.
    pub async fn assign_task(&self, identity: &AgentIdentity) -> Result<(), AgentError> {
        let old_status = {
            let mut state = self.state.write().await;
            let record = state
                .records
                .get_mut(identity)
                .ok_or_else(|| AgentError::NotFound(identity.id.clone()))?;
            if !record.status.is_assignable() {
                return Err(AgentError::Unavailable(identity.id.clone()));
            }
            let old = record.status;
            record.set_status(AgentStatus::Busy);
            old
        };
        self.events.publish(OrchestrationEvent::AgentStatusChanged {
            identity: identity.clone(),
            old_status,
            new_status: AgentStatus::Busy,
        });
        Ok(())
    }

    /// Spawns the liveness scanner and synthetic-idle-heartbeat ticker as
    /// one supervising task selecting between two independent timers,
    /// mirroring the teacher's two-timer `tokio::select!` shape.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut liveness_tick = tokio::time::interval(LIVENESS_SCAN_INTERVAL);
            let mut idle_heartbeat_tick = tokio::time::interval(IDLE_HEARTBEAT_INTERVAL);

            info!("agent registry liveness loop started");

            loop {
                tokio::select! {
                    _ = liveness_tick.tick() => {
                        registry.scan_liveness().await;
                    }
                    _ = idle_heartbeat_tick.tick() => {
                        registry.synthesize_idle_heartbeats().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("agent registry liveness loop stopping");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn scan_liveness(&self) {
        let now = Utc::now();
        let mut transitions = Vec::new();
        {
            let mut state = self.state.write().await;
            for record in state.records.values_mut() {
                if record.status == AgentStatus::Offline {
                    continue;
                }
                let stale_ms = now.signed_duration_since(record.last_updated_at).num_milliseconds();
                if stale_ms > self.staleness_threshold_ms as i64 {
                    let old_status = record.status;
                    record.set_status(AgentStatus::Offline);
                    transitions.push((record.identity.clone(), old_status));
                }
            }
        }
        for (identity, old_status) in transitions {
            warn!(agent_id = %identity.id, "agent liveness expired, marking offline");
            self.events.publish(OrchestrationEvent::AgentStatusChanged {
                identity,
                old_status,
                new_status: AgentStatus::Offline,
            });
        }
    }

    async fn synthesize_idle_heartbeats(&self) {
        let now = Utc::now();
        let mut state = self.state.write().await;
        for record in state.records.values_mut() {
            if record.status == AgentStatus::Idle {
                let idle_secs = now.signed_duration_since(record.last_updated_at).num_seconds();
                if idle_secs > IDLE_HEARTBEAT_STALE_AFTER_SECS {
                    record.touch();
                }
            }
        }
    }
}
