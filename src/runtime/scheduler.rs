//! Task Scheduler: accepts submissions, dispatches to capable and available
//! agents, and reacts to registry status changes. Grounded on the teacher's
//! `ResourceMonitor` ticker shape for the dispatch loop and on
//! `domain::models::queue::TaskQueue` for ordering.

use crate::domain::error::TaskError;
use crate::domain::models::agent::{AgentIdentity, AgentStatus};
use crate::domain::models::queue::{QueueKey, TaskQueue};
use crate::domain::models::task::{Task, TaskSpec, TaskStatus};
use crate::infrastructure::events::{Envelope, EventBus, OrchestrationEvent};
use crate::runtime::registry::AgentRegistry;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

const DISPATCH_TICK_INTERVAL: Duration = Duration::from_secs(1);
const DISPATCH_BATCH_SIZE: usize = 10;
const COMPLETED_ARCHIVE_CAPACITY: usize = 1024;

#[derive(Default)]
struct SchedulerState {
    pending: TaskQueue<Uuid>,
    tasks: HashMap<Uuid, Task>,
    running: HashMap<Uuid, AgentIdentity>,
    completed: VecDeque<Task>,
}

impl SchedulerState {
    fn archive(&mut self, task: Task) {
        if self.completed.len() >= COMPLETED_ARCHIVE_CAPACITY {
            self.completed.pop_front();
        }
        self.completed.push_back(task);
    }
}

pub struct TaskScheduler {
    state: RwLock<SchedulerState>,
    registry: Arc<AgentRegistry>,
    events: Arc<EventBus>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TaskScheduler {
    pub fn new(registry: Arc<AgentRegistry>, events: Arc<EventBus>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            state: RwLock::new(SchedulerState::default()),
            registry,
            events,
            shutdown_tx,
        }
    }

    pub async fn submit(&self, spec: TaskSpec) -> Uuid {
        let task = Task::from_spec(spec);
        let id = task.id;
        let key = QueueKey {
            priority: task.priority,
            created_at: task.created_at,
            id,
        };
        let mut state = self.state.write().await;
        state.pending.enqueue(id, key);
        state.tasks.insert(id, task);
        drop(state);
        self.events.publish(OrchestrationEvent::TaskSubmitted { task_id: id });
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<Task> {
        let state = self.state.read().await;
        if let Some(task) = state.tasks.get(&id) {
            return Some(task.clone());
        }
        state.completed.iter().find(|t| t.id == id).cloned()
    }

    pub async fn cancel(&self, id: Uuid) -> Result<(), TaskError> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or(TaskError::NotFound(id))?;
        if task.status.is_terminal() {
            return Err(TaskError::Invalid(format!("task {id} already terminal")));
        }
        task.cancel();
        state.pending.remove_matching(|pending_id| *pending_id == id);
        state.running.remove(&id);
        let cancelled = state.tasks.remove(&id).unwrap();
        state.archive(cancelled);
        drop(state);
        self.events.publish(OrchestrationEvent::TaskCancelled { task_id: id });
        Ok(())
    }

    pub async fn complete(&self, id: Uuid, result: Value) -> Result<(), TaskError> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or(TaskError::NotFound(id))?;
        task.complete(result);
        state.running.remove(&id);
        let completed = state.tasks.remove(&id).unwrap();
        state.archive(completed);
        drop(state);
        self.events.publish(OrchestrationEvent::TaskCompleted { task_id: id });
        Ok(())
    }

    pub async fn fail(&self, id: Uuid, reason: impl Into<String>) -> Result<(), TaskError> {
        let reason = reason.into();
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or(TaskError::NotFound(id))?;
        task.fail(reason.clone());
        state.running.remove(&id);
        let failed = state.tasks.remove(&id).unwrap();
        state.archive(failed);
        drop(state);
        self.events
            .publish(OrchestrationEvent::TaskFailed { task_id: id, reason });
        Ok(())
    }

    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }

    pub async fn running_count(&self) -> usize {
        self.state.read().await.running.len()
    }

    /// Spawns the 1s dispatch tick and the registry status-change listener
    /// as one supervising task, mirroring the registry's own two-source
    /// `tokio::select!` shape.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut status_rx = self.events.subscribe();

        tokio::spawn(async move {
            let mut dispatch_tick = tokio::time::interval(DISPATCH_TICK_INTERVAL);
            info!("task scheduler dispatch loop started");

            loop {
                tokio::select! {
                    _ = dispatch_tick.tick() => {
                        scheduler.sweep_deadlines().await;
                        scheduler.dispatch_batch().await;
                    }
                    event = status_rx.recv() => {
                        match event {
                            Ok(envelope) => scheduler.on_event(envelope).await,
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "scheduler missed events while lagging");
                            }
                            Err(broadcast::error::RecvError::Closed) => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("task scheduler dispatch loop stopping");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn on_event(&self, envelope: Envelope) {
        if let OrchestrationEvent::AgentStatusChanged {
            identity, new_status, ..
        } = envelope.event
        {
            if matches!(new_status, AgentStatus::Offline | AgentStatus::Error) {
                self.reassign_tasks_from(&identity).await;
            }
        }
    }

    async fn reassign_tasks_from(&self, identity: &AgentIdentity) {
        let mut state = self.state.write().await;
        let stuck: Vec<Uuid> = state
            .running
            .iter()
            .filter(|(_, assigned)| *assigned == identity)
            .map(|(id, _)| *id)
            .collect();
        for id in stuck {
            state.running.remove(&id);
            if let Some(task) = state.tasks.get_mut(&id) {
                task.demote_to_pending();
                let key = QueueKey {
                    priority: task.priority,
                    created_at: task.created_at,
                    id,
                };
                // Re-enqueue uses normal priority ordering, not LIFO.
                state.pending.enqueue(id, key);
                warn!(task_id = %id, agent_id = %identity.id, "reassigning task off unavailable agent");
            }
        }
    }

    async fn sweep_deadlines(&self) {
        let now = Utc::now();
        let expired: Vec<Uuid> = {
            let state = self.state.read().await;
            state
                .tasks
                .values()
                .filter(|t| !t.status.is_terminal() && t.is_past_deadline(now))
                .map(|t| t.id)
                .collect()
        };
        for id in expired {
            let _ = self.fail(id, "deadline exceeded").await;
        }
    }

    async fn dispatch_batch(&self) {
        for _ in 0..DISPATCH_BATCH_SIZE {
            let candidate_id = {
                let state = self.state.read().await;
                state.pending.peek().copied()
            };
            let Some(id) = candidate_id else {
                break;
            };

            let required = {
                let state = self.state.read().await;
                state.tasks.get(&id).map(|t| t.required_capabilities.clone())
            };
            let Some(required) = required else {
                let mut state = self.state.write().await;
                state.pending.remove_matching(|pending_id| *pending_id == id);
                continue;
            };

            let agent = self
                .registry
                .list_available()
                .await
                .into_iter()
                .find(|a| a.has_capabilities(&required));

            let Some(agent) = agent else {
                // No capable agent available this tick; leave at the head
                // of the queue and stop scanning further (preserves order).
                break;
            };

            if self.registry.assign_task(&agent.identity).await.is_err() {
                // Lost the race for this agent; retry next tick.
                continue;
            }

            let mut state = self.state.write().await;
            state.pending.remove_matching(|pending_id| *pending_id == id);
            if let Some(task) = state.tasks.get_mut(&id) {
                task.assign(agent.identity.clone());
                state.running.insert(id, agent.identity.clone());
            }
            drop(state);

            self.events.publish(OrchestrationEvent::TaskAssigned {
                task_id: id,
                agent_id: agent.identity.id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent::{AgentKind, AgentRecord, Capability};
    use crate::domain::models::task::TaskPayload;

    fn spec(priority: i64, capability: &str) -> TaskSpec {
        TaskSpec {
            task_type: "code_lint".to_string(),
            priority,
            required_capabilities: vec![capability.to_string()],
            payload: TaskPayload::CodeLint {
                path: "src/main.rs".to_string(),
            },
            deadline: None,
        }
    }

    async fn scheduler_with_registry() -> (Arc<TaskScheduler>, Arc<AgentRegistry>) {
        let events = Arc::new(EventBus::new(64));
        let registry = Arc::new(AgentRegistry::new(Arc::clone(&events), 90_000));
        let scheduler = Arc::new(TaskScheduler::new(Arc::clone(&registry), events));
        (scheduler, registry)
    }

    #[tokio::test]
    async fn submit_enqueues_as_pending() {
        let (scheduler, _registry) = scheduler_with_registry().await;
        let id = scheduler.submit(spec(5, "lint")).await;
        assert_eq!(scheduler.pending_count().await, 1);
        assert_eq!(scheduler.get(id).await.unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn dispatch_assigns_to_capable_available_agent() {
        let (scheduler, registry) = scheduler_with_registry().await;
        let identity = AgentIdentity::new("a1", AgentKind::ValidationWorker, "1.0");
        registry
            .register(AgentRecord::new(identity.clone(), vec![Capability::new("lint", "1.0")]))
            .await;
        registry.update_status(&identity, AgentStatus::Idle).await.unwrap();

        let id = scheduler.submit(spec(5, "lint")).await;
        scheduler.dispatch_batch().await;

        let task = scheduler.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.assigned_to.unwrap().id, "a1");
        assert_eq!(scheduler.pending_count().await, 0);
    }

    #[tokio::test]
    async fn dispatch_skips_task_with_no_capable_agent() {
        let (scheduler, _registry) = scheduler_with_registry().await;
        let id = scheduler.submit(spec(5, "lint")).await;
        scheduler.dispatch_batch().await;
        assert_eq!(scheduler.get(id).await.unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn reassign_tasks_from_offline_agent_requeues() {
        let (scheduler, registry) = scheduler_with_registry().await;
        let identity = AgentIdentity::new("a1", AgentKind::ValidationWorker, "1.0");
        registry
            .register(AgentRecord::new(identity.clone(), vec![Capability::new("lint", "1.0")]))
            .await;
        registry.update_status(&identity, AgentStatus::Idle).await.unwrap();

        let id = scheduler.submit(spec(5, "lint")).await;
        scheduler.dispatch_batch().await;
        assert_eq!(scheduler.running_count().await, 1);

        scheduler.reassign_tasks_from(&identity).await;
        assert_eq!(scheduler.running_count().await, 0);
        assert_eq!(scheduler.get(id).await.unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn complete_archives_task() {
        let (scheduler, _registry) = scheduler_with_registry().await;
        let id = scheduler.submit(spec(5, "lint")).await;
        scheduler.complete(id, Value::Null).await.unwrap();
        assert_eq!(scheduler.get(id).await.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_unknown_task_errors() {
        let (scheduler, _registry) = scheduler_with_registry().await;
        assert!(matches!(
            scheduler.cancel(Uuid::new_v4()).await,
            Err(TaskError::NotFound(_))
        ));
    }
}
