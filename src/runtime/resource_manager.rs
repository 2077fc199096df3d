//! Resource Manager: samples process memory and CPU via `sysinfo`, tracks
//! the request-rate counter, and reads the registry/scheduler's live counts
//! each tick, driving the memory hysteresis state machine. Grounded directly
//! on the teacher's `application::resource_monitor::ResourceMonitor`
//! sampling loop, generalized from its flat `within_limits`/`should_throttle`
//! booleans to the `MemoryState` hysteresis machine.

use crate::domain::models::config::ResourceLimitsConfig;
use crate::domain::models::resource::{MemoryBreakdown, MemoryState, ResourceSnapshot};
use crate::runtime::registry::AgentRegistry;
use crate::runtime::scheduler::TaskScheduler;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Pid, RefreshKind, System};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct ResourceManager {
    system: RwLock<System>,
    limits: ResourceLimitsConfig,
    memory_state: RwLock<MemoryState>,
    latest: RwLock<Option<ResourceSnapshot>>,
    request_timestamps: RwLock<VecDeque<std::time::Instant>>,
    registry: Arc<AgentRegistry>,
    scheduler: Arc<TaskScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    pid: Pid,
}

impl ResourceManager {
    pub fn new(limits: ResourceLimitsConfig, registry: Arc<AgentRegistry>, scheduler: Arc<TaskScheduler>) -> Self {
        let refresh_kind = RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            system: RwLock::new(System::new_with_specifics(refresh_kind)),
            limits,
            memory_state: RwLock::new(MemoryState::Normal),
            latest: RwLock::new(None),
            request_timestamps: RwLock::new(VecDeque::new()),
            registry,
            scheduler,
            shutdown_tx,
            pid: sysinfo::get_current_pid().unwrap_or(Pid::from(0)),
        }
    }

    pub async fn record_request(&self) {
        self.request_timestamps.write().await.push_back(std::time::Instant::now());
    }

    pub async fn latest_snapshot(&self) -> Option<ResourceSnapshot> {
        self.latest.read().await.clone()
    }

    pub async fn memory_state(&self) -> MemoryState {
        *self.memory_state.read().await
    }

    async fn sample(&self) -> ResourceSnapshot {
        let (rss_mb, cpu_percent) = {
            let mut system = self.system.write().await;
            system.refresh_cpu_all();
            system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
            let rss_mb = system.process(self.pid).map_or(0, |p| p.memory() / 1024 / 1024);
            let cpu_percent = system.global_cpu_usage() as f64;
            (rss_mb, cpu_percent)
        };

        let usage_ratio = if self.limits.max_memory_mb == 0 {
            0.0
        } else {
            rss_mb as f64 / self.limits.max_memory_mb as f64
        };

        let next_state = {
            let mut state = self.memory_state.write().await;
            *state = state.next(usage_ratio);
            *state
        };

        if next_state == MemoryState::Critical {
            warn!(rss_mb, limit_mb = self.limits.max_memory_mb, "memory state critical");
        }

        let requests_last_minute = self.prune_and_count_requests().await;
        let active_agents = self.registry.count().await;
        let concurrent_tasks = self.scheduler.running_count().await;

        ResourceSnapshot {
            memory: MemoryBreakdown {
                rss_mb,
                heap_mb: 0,
                external_mb: 0,
            },
            memory_state: next_state,
            memory_usage_mb: rss_mb,
            memory_limit_mb: self.limits.max_memory_mb,
            memory_headroom_mb: self.limits.max_memory_mb as i64 - rss_mb as i64,
            cpu_percent,
            active_agents,
            concurrent_tasks,
            requests_last_minute,
        }
    }

    async fn prune_and_count_requests(&self) -> u64 {
        let mut timestamps = self.request_timestamps.write().await;
        let cutoff = std::time::Instant::now() - Duration::from_secs(60);
        while timestamps.front().is_some_and(|t| *t < cutoff) {
            timestamps.pop_front();
        }
        timestamps.len() as u64
    }

    pub fn start(self: &Arc<Self>, sample_interval: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(sample_interval);
            info!("resource manager sampling loop started");

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let snapshot = manager.sample().await;
                        *manager.latest.write().await = Some(snapshot);
                    }
                    _ = shutdown_rx.recv() => {
                        info!("resource manager sampling loop stopping");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
