//! Neural Mesh: rebuilds node connectivity as agents join/leave the
//! registry and decays idle connections on a periodic tick. Grounded on
//! the teacher's `ResourceMonitor` two-timer ticker for the update-plus-
//! bounded-runtime loop.

use crate::domain::models::agent::AgentIdentity;
use crate::domain::models::mesh::{Connection, ConnectionKind, MeshNode};
use crate::infrastructure::events::{EventBus, OrchestrationEvent};
use crate::runtime::registry::AgentRegistry;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

const UPDATE_TICK_INTERVAL: Duration = Duration::from_secs(5);
const IDLE_DECAY_AFTER: Duration = Duration::from_secs(60);
const DECAY_FACTOR: f64 = 0.95;
const DEFAULT_PROTOCOL_TAG: &str = "ws";

pub struct NeuralMesh {
    nodes: RwLock<HashMap<AgentIdentity, MeshNode>>,
    registry: Arc<AgentRegistry>,
    events: Arc<EventBus>,
    max_connections: usize,
    /// 0 means unbounded; checked against wall-clock elapsed since `start`.
    max_run_duration: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl NeuralMesh {
    pub fn new(
        registry: Arc<AgentRegistry>,
        events: Arc<EventBus>,
        max_connections: usize,
        max_run_duration_ms: u64,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            nodes: RwLock::new(HashMap::new()),
            registry,
            events,
            max_connections,
            max_run_duration: Duration::from_millis(max_run_duration_ms),
            shutdown_tx,
        }
    }

    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.nodes.read().await.values().map(|n| n.connections.len()).sum()
    }

    pub async fn ensure_node(&self, identity: AgentIdentity) {
        let mut nodes = self.nodes.write().await;
        nodes.entry(identity.clone()).or_insert_with(|| {
            let mut rng = rand::thread_rng();
            let position = [
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
            ];
            MeshNode::new(identity, position)
        });
    }

    pub async fn remove_node(&self, identity: &AgentIdentity) {
        let mut nodes = self.nodes.write().await;
        nodes.remove(identity);
        for node in nodes.values_mut() {
            node.connections.retain(|c| &c.target != identity);
        }
    }

    /// Clears every node's outbound connections and rebuilds them from a
    /// fresh random permutation of the other node ids, taking the first
    /// `min(max_connections, otherCount)`.
    pub async fn rebuild(&self) {
        let mut nodes = self.nodes.write().await;
        let ids: Vec<AgentIdentity> = nodes.keys().cloned().collect();
        let mut rng = rand::thread_rng();

        for id in &ids {
            let mut others: Vec<AgentIdentity> = ids.iter().filter(|other| *other != id).cloned().collect();
            others.shuffle(&mut rng);
            let take = self.max_connections.min(others.len());
            let connections: Vec<Connection> = others
                .into_iter()
                .take(take)
                .map(|target| {
                    let weight = rand::random::<f64>().clamp(f64::EPSILON, 1.0);
                    Connection::new(target, weight, ConnectionKind::Async, DEFAULT_PROTOCOL_TAG)
                })
                .collect();
            if let Some(node) = nodes.get_mut(id) {
                node.set_connections(connections);
            }
        }
        drop(nodes);
        self.emit_topology_updated().await;
    }

    async fn decay_idle_connections(&self) {
        let now = Utc::now();
        let idle_after = chrono::Duration::from_std(IDLE_DECAY_AFTER).unwrap();
        let mut nodes = self.nodes.write().await;
        for node in nodes.values_mut() {
            for connection in &mut node.connections {
                if connection.is_idle(now, idle_after) {
                    connection.decay(DECAY_FACTOR);
                }
            }
        }
    }

    async fn emit_topology_updated(&self) {
        let nodes = self.nodes.read().await;
        let node_count = nodes.len();
        let connection_count: usize = nodes.values().map(|n| n.connections.len()).sum();
        let avg_connections_per_node = if node_count == 0 {
            0.0
        } else {
            connection_count as f64 / node_count as f64
        };
        drop(nodes);
        self.events.publish(OrchestrationEvent::TopologyUpdated {
            node_count,
            connection_count,
            avg_connections_per_node,
        });
    }

    /// Supervises the rebuild/decay cadence, the registry's membership
    /// events, and the bounded-runtime deadline, all selected in one loop
    /// following the teacher's `ResourceMonitor::start` shape.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let mesh = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut membership_rx = self.events.subscribe();
        let started_at = Instant::now();
        let bounded = self.max_run_duration;

        tokio::spawn(async move {
            let mut update_tick = tokio::time::interval(UPDATE_TICK_INTERVAL);
            info!("neural mesh update loop started");

            loop {
                tokio::select! {
                    _ = update_tick.tick() => {
                        if !bounded.is_zero() && started_at.elapsed() >= bounded {
                            mesh.events.publish(OrchestrationEvent::RunStopped {
                                reason: "timeout".to_string(),
                                duration_ms: started_at.elapsed().as_millis() as u64,
                            });
                            mesh.emit_topology_updated().await;
                            info!("neural mesh run duration exceeded, stopping");
                            break;
                        }
                        mesh.decay_idle_connections().await;
                        mesh.rebuild().await;
                    }
                    event = membership_rx.recv() => {
                        match event {
                            Ok(envelope) => mesh.on_event(envelope.event).await,
                            Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        mesh.events.publish(OrchestrationEvent::RunStopped {
                            reason: "manual".to_string(),
                            duration_ms: started_at.elapsed().as_millis() as u64,
                        });
                        info!("neural mesh update loop stopping");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn on_event(&self, event: OrchestrationEvent) {
        match event {
            OrchestrationEvent::AgentRegistered { identity } => {
                self.ensure_node(identity).await;
                self.rebuild().await;
            }
            OrchestrationEvent::AgentUnregistered { identity } => {
                self.remove_node(&identity).await;
                self.rebuild().await;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent::AgentKind;

    fn identity(id: &str) -> AgentIdentity {
        AgentIdentity::new(id, AgentKind::CodeWorker, "1.0")
    }

    fn mesh() -> NeuralMesh {
        let events = Arc::new(EventBus::new(64));
        let registry = Arc::new(AgentRegistry::new(Arc::clone(&events), 90_000));
        NeuralMesh::new(registry, events, 5, 3_600_000)
    }

    #[tokio::test]
    async fn rebuild_connects_up_to_max_connections() {
        let mesh = mesh();
        for i in 0..8 {
            mesh.ensure_node(identity(&format!("a{i}"))).await;
        }
        mesh.rebuild().await;
        let nodes = mesh.nodes.read().await;
        for node in nodes.values() {
            assert!(node.connections.len() <= 5);
            assert!(!node.connections.iter().any(|c| c.target == node.agent));
        }
    }

    #[tokio::test]
    async fn rebuild_with_fewer_than_max_connects_all_others() {
        let mesh = mesh();
        mesh.ensure_node(identity("a1")).await;
        mesh.ensure_node(identity("a2")).await;
        mesh.ensure_node(identity("a3")).await;
        mesh.rebuild().await;
        let nodes = mesh.nodes.read().await;
        for node in nodes.values() {
            assert_eq!(node.connections.len(), 2);
        }
    }

    #[tokio::test]
    async fn remove_node_drops_it_from_others_connections() {
        let mesh = mesh();
        mesh.ensure_node(identity("a1")).await;
        mesh.ensure_node(identity("a2")).await;
        mesh.rebuild().await;
        mesh.remove_node(&identity("a1")).await;
        let nodes = mesh.nodes.read().await;
        assert_eq!(nodes.len(), 1);
        assert!(!nodes
            .values()
            .any(|n| n.connections.iter().any(|c| c.target == identity("a1"))));
    }

    #[tokio::test]
    async fn decay_reduces_idle_connection_weight() {
        let mesh = mesh();
        mesh.ensure_node(identity("a1")).await;
        mesh.ensure_node(identity("a2")).await;
        mesh.rebuild().await;

        {
            let mut nodes = mesh.nodes.write().await;
            for node in nodes.values_mut() {
                for conn in &mut node.connections {
                    conn.last_activity = Utc::now() - chrono::Duration::seconds(120);
                }
            }
        }

        let before: f64 = {
            let nodes = mesh.nodes.read().await;
            nodes.values().map(|n| n.average_connection_weight()).sum()
        };
        mesh.decay_idle_connections().await;
        let after: f64 = {
            let nodes = mesh.nodes.read().await;
            nodes.values().map(|n| n.average_connection_weight()).sum()
        };
        assert!(after <= before);
    }
}
