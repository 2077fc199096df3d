//! Lifecycle Orchestrator: builds every subsystem in dependency order,
//! tears them down in reverse, and owns the shutdown signal fanned out to
//! every subsystem ticker. Grounded on the teacher's single
//! `broadcast::Sender<()>` shutdown pattern, generalized from one ticker to
//! the whole subsystem graph.

use crate::domain::error::LifecycleError;
use crate::domain::models::config::Config;
use crate::domain::models::task::TaskSpec;
use crate::infrastructure::events::{Envelope, EventBus};
use crate::runtime::consensus::ConsensusManager;
use crate::runtime::health::HealthMonitor;
use crate::runtime::mesh::NeuralMesh;
use crate::runtime::registry::AgentRegistry;
use crate::runtime::resource_manager::ResourceManager;
use crate::runtime::scheduler::TaskScheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(60);

/// Owns every subsystem and the handles of their background tickers.
/// `initialize` and `shutdown` are both idempotent — calling either twice
/// is a no-op on the second call rather than an error, since a caller
/// racing a signal handler against a manual shutdown shouldn't have to
/// coordinate who calls first.
pub struct Orchestrator {
    config: Config,
    events: Arc<EventBus>,
    registry: Arc<AgentRegistry>,
    scheduler: Arc<TaskScheduler>,
    mesh: Arc<NeuralMesh>,
    consensus: Arc<ConsensusManager>,
    resources: Arc<ResourceManager>,
    health: Arc<HealthMonitor>,
    initialized: AtomicBool,
    shut_down: AtomicBool,
    handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Wires every subsystem without starting their background loops.
    /// Background loops start in `initialize()` so construction itself
    /// never fails on I/O, only on invalid config (already validated by
    /// the caller via `ConfigLoader`).
    pub fn build(config: Config) -> Arc<Self> {
        let events = Arc::new(EventBus::new(1024));
        let registry = Arc::new(AgentRegistry::new(Arc::clone(&events), config.system.heartbeat_interval_ms));
        let scheduler = Arc::new(TaskScheduler::new(Arc::clone(&registry), Arc::clone(&events)));
        let mesh = Arc::new(NeuralMesh::new(
            Arc::clone(&registry),
            Arc::clone(&events),
            config.mesh.max_connections,
            config.mesh.max_run_duration_ms,
        ));
        let consensus = Arc::new(ConsensusManager::new(
            Arc::clone(&registry),
            Arc::clone(&events),
            config.consensus.min_votes,
            config.consensus.timeout_ms,
        ));
        let resources = Arc::new(ResourceManager::new(
            config.resources,
            Arc::clone(&registry),
            Arc::clone(&scheduler),
        ));
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&scheduler),
            Arc::clone(&mesh),
            Arc::clone(&resources),
            Arc::clone(&events),
        ));

        Arc::new(Self {
            config,
            events,
            registry,
            scheduler,
            mesh,
            consensus,
            resources,
            health,
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            handles: tokio::sync::Mutex::new(Vec::new()),
        })
    }

    /// Starts every subsystem ticker in dependency order: Resource/Health
    /// primitives → Registry → {Scheduler, Mesh, Consensus}. Unwinds
    /// (shuts down) whatever already started if a later step fails; today
    /// subsystem `start()` calls are infallible, so the unwind path exists
    /// for the shape, not because a failure is currently reachable.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), LifecycleError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            warn!("orchestrator already initialized, ignoring");
            return Ok(());
        }

        let mut handles = self.handles.lock().await;
        handles.push(
            self.resources
                .start(Duration::from_millis(self.config.resources.sample_interval_ms)),
        );
        if let Some(health_handle) = self.health.start(HEALTH_CHECK_PERIOD) {
            handles.push(health_handle);
        }
        handles.push(self.registry.start());
        handles.push(self.scheduler.start());
        handles.push(self.mesh.start());

        info!("orchestrator initialized");
        Ok(())
    }

    /// Sequential, reverse-order shutdown that aggregates errors instead of
    /// propagating the first one, since every subsystem should get a chance
    /// to flush regardless of an earlier failure.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            warn!("orchestrator already shut down, ignoring");
            return;
        }

        self.mesh.shutdown();
        self.scheduler.shutdown();
        self.registry.shutdown();
        self.health.shutdown();
        self.resources.shutdown();

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..).rev() {
            if let Err(err) = handle.await {
                error!(?err, "subsystem ticker task panicked during shutdown");
            }
        }
        info!("orchestrator shut down");
    }

    pub async fn register_agent(&self, record: crate::domain::models::agent::AgentRecord) {
        self.resources.record_request().await;
        self.registry.register(record).await;
    }

    pub async fn submit_task(&self, spec: TaskSpec) -> Uuid {
        self.resources.record_request().await;
        self.scheduler.submit(spec).await
    }

    pub async fn propose(self: &Arc<Self>, proposal_type: impl Into<String>, proposer: impl Into<String>, data: serde_json::Value) -> Uuid {
        self.resources.record_request().await;
        self.consensus.propose(proposal_type, proposer, data).await
    }

    pub async fn vote(&self, vote: crate::domain::models::consensus::Vote) {
        self.resources.record_request().await;
        self.consensus.vote(vote).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.events.subscribe()
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    pub fn mesh(&self) -> &Arc<NeuralMesh> {
        &self.mesh
    }

    pub fn consensus(&self) -> &Arc<ConsensusManager> {
        &self.consensus
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Takes ownership of every subsystem ticker handle and watches them for
    /// a panic — the "unhandled asynchronous error" path of the global error
    /// policy. A ticker completing normally (the mesh's own bounded-runtime
    /// stop, or a caller-initiated `shutdown()` elsewhere causing the rest to
    /// wind down) is not escalated; only a panic is. On a panic this calls
    /// `shutdown()` itself to tear down the remaining subsystems and
    /// resolves `true` so `src/main.rs` can exit nonzero; resolves `false`
    /// if every ticker drains without one.
    ///
    /// Once called, `shutdown()`'s own handle-joining loop finds nothing left
    /// to join for this orchestrator — this method is the sole owner of the
    /// handles from the point it's called.
    pub fn supervise_tickers(self: &Arc<Self>) -> JoinHandle<bool> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut remaining = std::mem::take(&mut *orchestrator.handles.lock().await);
            while !remaining.is_empty() {
                let (result, _index, rest) = futures::future::select_all(remaining).await;
                remaining = rest;
                if let Err(err) = result {
                    error!(?err, "subsystem ticker task panicked, shutting down");
                    orchestrator.shutdown().await;
                    return true;
                }
            }
            false
        })
    }

    /// Installs SIGINT/SIGTERM handling: a signal-triggered shutdown runs
    /// `shutdown()` and returns normally (exit code left to the caller, 0
    /// on the clean path); this task itself never represents the
    /// "unhandled" error path — that's `supervise_tickers`, selected
    /// alongside this handle in `src/main.rs`.
    pub fn install_signal_handlers(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    error!(?err, "failed to install SIGTERM handler");
                    return;
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received SIGINT, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                }
            }
            orchestrator.shutdown().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent::{AgentIdentity, AgentKind, AgentRecord};
    use crate::domain::models::task::TaskPayload;

    #[tokio::test]
    async fn initialize_then_shutdown_is_idempotent() {
        let orchestrator = Orchestrator::build(Config::default());
        orchestrator.initialize().await.unwrap();
        orchestrator.initialize().await.unwrap();
        orchestrator.shutdown().await;
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn register_and_submit_flow_through_to_subsystems() {
        let orchestrator = Orchestrator::build(Config::default());
        orchestrator.initialize().await.unwrap();

        let identity = AgentIdentity::new("a1", AgentKind::CodeWorker, "1.0");
        orchestrator.register_agent(AgentRecord::new(identity.clone(), vec![])).await;
        assert_eq!(orchestrator.registry().count().await, 1);

        let task_id = orchestrator
            .submit_task(TaskSpec {
                task_type: "code_generation".to_string(),
                priority: 1,
                required_capabilities: vec![],
                payload: TaskPayload::CodeGeneration {
                    prompt: "hi".to_string(),
                },
                deadline: None,
            })
            .await;
        assert!(orchestrator.scheduler().get(task_id).await.is_some());

        orchestrator.shutdown().await;
    }
}
