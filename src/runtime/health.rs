//! Health Monitor: composes named checks from the other subsystems into an
//! overall status, with an optional periodic timer. Grounded on the
//! teacher's ticker-with-guard-against-double-start pattern.

use crate::domain::models::resource::{CheckStatus, HealthCheckResult, MemoryState};
use crate::infrastructure::events::{EventBus, OrchestrationEvent};
use crate::runtime::mesh::NeuralMesh;
use crate::runtime::registry::AgentRegistry;
use crate::runtime::resource_manager::ResourceManager;
use crate::runtime::scheduler::TaskScheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct HealthMonitor {
    registry: Arc<AgentRegistry>,
    scheduler: Arc<TaskScheduler>,
    mesh: Arc<NeuralMesh>,
    resources: Arc<ResourceManager>,
    events: Arc<EventBus>,
    started: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        scheduler: Arc<TaskScheduler>,
        mesh: Arc<NeuralMesh>,
        resources: Arc<ResourceManager>,
        events: Arc<EventBus>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registry,
            scheduler,
            mesh,
            resources,
            events,
            started: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub async fn run_checks(&self) -> Vec<HealthCheckResult> {
        let mut results = vec![HealthCheckResult::pass("system-status", "running")];

        results.push(self.memory_usage_check().await);

        let registry_count = self.registry.count().await;
        results.push(HealthCheckResult::pass(
            "agent-registry",
            format!("{registry_count} agents registered"),
        ));

        let pending = self.scheduler.pending_count().await;
        results.push(if pending > 0 {
            HealthCheckResult::pass("task-scheduler", format!("{pending} tasks pending"))
        } else {
            HealthCheckResult::pass("task-scheduler", "idle")
        });

        let node_count = self.mesh.node_count().await;
        results.push(HealthCheckResult::pass("neural-mesh", format!("{node_count} nodes")));

        results.push(HealthCheckResult::pass("swarm-consensus-runtime", "running"));

        results
    }

    async fn memory_usage_check(&self) -> HealthCheckResult {
        match self.resources.memory_state().await {
            MemoryState::Critical => HealthCheckResult::fail("memory-usage", "memory state critical"),
            MemoryState::Elevated => HealthCheckResult::warn("memory-usage", "memory state elevated"),
            MemoryState::Normal => HealthCheckResult::pass("memory-usage", "memory state normal"),
        }
    }

    pub async fn overall(&self) -> CheckStatus {
        HealthCheckResult::overall(&self.run_checks().await)
    }

    /// Starting the periodic timer twice is rejected with a warning rather
    /// than erroring, since the caller can't easily recover from a second
    /// `start()` other than ignoring it.
    pub fn start(self: &Arc<Self>, period: Duration) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("health monitor periodic timer already started, ignoring");
            return None;
        }

        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            info!("health monitor periodic checks started");

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let overall = monitor.overall().await;
                        if overall != CheckStatus::Pass {
                            warn!(?overall, "health check degraded");
                        }
                        monitor.events.publish(OrchestrationEvent::HealthCheck { overall });
                    }
                    _ = shutdown_rx.recv() => {
                        info!("health monitor periodic checks stopping");
                        break;
                    }
                }
            }
        }))
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
