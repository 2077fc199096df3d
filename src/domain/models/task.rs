//! Task domain model: the unit of work the scheduler queues and assigns.

use crate::domain::models::agent::AgentIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Tagged union over the known task-type set (REDESIGN FLAG, spec.md §9):
/// the source modeled payloads as free-form maps; here every known type
/// gets a typed variant and anything else falls back to `Opaque`.
///
/// Serialization uses the ordinary `{"type": ..., "data": ...}` envelope
/// (derived); deserialization is hand-written below so that an unrecognized
/// `type` lands in `Opaque` rather than failing the whole task submission —
/// the envelope is a closed set for production code but open for payloads
/// coming off the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskPayload {
    CodeGeneration { prompt: String },
    CodeLint { path: String },
    CodeExecute { command: String },
    DataProcessing { source: String },
    DataAnalysis { dataset: String },
    DataSummary { dataset: String },
    ValidateCode { path: String },
    QualityReport { target: String },
    BridgeMessage { endpoint: String, body: Value },
    TopologyUpdate { reason: String },
    TopologySuggestion { suggestion: String },
    ManageConsensus { proposal_id: Uuid },
    SystemUpgrade { version: String },
    /// Fallback for task types not in the known set.
    Opaque(Value),
}

impl<'de> Deserialize<'de> for TaskPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let envelope = Value::deserialize(deserializer)?;
        let task_type = envelope.get("type").and_then(Value::as_str);
        let data = envelope.get("data").cloned().unwrap_or(Value::Null);

        let parsed = match task_type {
            Some("code_generation") => serde_json::from_value(data).ok().map(Self::CodeGeneration),
            Some("code_lint") => serde_json::from_value(data).ok().map(Self::CodeLint),
            Some("code_execute") => serde_json::from_value(data).ok().map(Self::CodeExecute),
            Some("data_processing") => serde_json::from_value(data).ok().map(Self::DataProcessing),
            Some("data_analysis") => serde_json::from_value(data).ok().map(Self::DataAnalysis),
            Some("data_summary") => serde_json::from_value(data).ok().map(Self::DataSummary),
            Some("validate_code") => serde_json::from_value(data).ok().map(Self::ValidateCode),
            Some("quality_report") => serde_json::from_value(data).ok().map(Self::QualityReport),
            Some("bridge_message") => serde_json::from_value(data).ok().map(Self::BridgeMessage),
            Some("topology_update") => serde_json::from_value(data).ok().map(Self::TopologyUpdate),
            Some("topology_suggestion") => {
                serde_json::from_value(data).ok().map(Self::TopologySuggestion)
            }
            Some("manage_consensus") => serde_json::from_value(data).ok().map(Self::ManageConsensus),
            Some("system_upgrade") => serde_json::from_value(data).ok().map(Self::SystemUpgrade),
            _ => None,
        };

        Ok(parsed.unwrap_or(Self::Opaque(envelope)))
    }
}

/// Status machine for a [`Task`]. `assignedTo` is set iff status is one of
/// `Assigned | Running | Completed | Failed`; terminal statuses never
/// re-enter the scheduler's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: String,
    pub priority: i64,
    pub required_capabilities: Vec<String>,
    pub payload: TaskPayload,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub assigned_to: Option<AgentIdentity>,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// What a caller provides to `Scheduler::submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_type: String,
    pub priority: i64,
    pub required_capabilities: Vec<String>,
    pub payload: TaskPayload,
    pub deadline: Option<DateTime<Utc>>,
}

impl Task {
    pub fn from_spec(spec: TaskSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: spec.task_type,
            priority: spec.priority,
            required_capabilities: spec.required_capabilities,
            payload: spec.payload,
            created_at: Utc::now(),
            deadline: spec.deadline,
            assigned_to: None,
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn assign(&mut self, agent: AgentIdentity) {
        self.assigned_to = Some(agent);
        self.status = TaskStatus::Running;
    }

    /// Demote a previously-assigned task back to Pending, e.g. on agent
    /// failure. Never used on a terminal task.
    pub fn demote_to_pending(&mut self) {
        self.assigned_to = None;
        self.status = TaskStatus::Pending;
    }

    pub fn complete(&mut self, result: Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.result = None;
    }

    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| d < now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TaskSpec {
        TaskSpec {
            task_type: "code_generation".to_string(),
            priority: 5,
            required_capabilities: vec!["code-generation".to_string()],
            payload: TaskPayload::CodeGeneration {
                prompt: "hello".to_string(),
            },
            deadline: None,
        }
    }

    #[test]
    fn new_task_is_pending_with_no_assignment() {
        let task = Task::from_spec(spec());
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.assigned_to.is_none());
    }

    #[test]
    fn complete_sets_result_and_clears_error() {
        let mut task = Task::from_spec(spec());
        task.fail("transient");
        task.complete(Value::Bool(true));
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
        assert!(task.error.is_none());
    }

    #[test]
    fn fail_sets_error_and_clears_result() {
        let mut task = Task::from_spec(spec());
        task.complete(Value::Null);
        task.fail("deadline exceeded");
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.is_some());
        assert!(task.result.is_none());
    }

    #[test]
    fn demote_clears_assignment() {
        let mut task = Task::from_spec(spec());
        task.assign(AgentIdentity::new(
            "a1",
            crate::domain::models::agent::AgentKind::CodeWorker,
            "1.0",
        ));
        assert_eq!(task.status, TaskStatus::Running);
        task.demote_to_pending();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.assigned_to.is_none());
    }

    #[test]
    fn opaque_payload_roundtrips_unknown_type() {
        let json = serde_json::json!({"type": "unknown_future_type", "data": {"x": 1}});
        let payload: TaskPayload = serde_json::from_value(json).unwrap();
        assert!(matches!(payload, TaskPayload::Opaque(_)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
