//! Error taxonomy for the orchestration runtime.
//!
//! Each enum groups errors from one subsystem. Every variant carries enough
//! structure to build a stable code and a human message; `retryable` and
//! `is_transient`/`is_permanent` helpers let retry primitives decide without
//! matching on strings.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the lifecycle orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("system not initialized")]
    NotInitialized,

    #[error("system is shutting down")]
    ShuttingDown,

    #[error("subsystem '{0}' failed to initialize: {1}")]
    SubsystemInitFailed(String, String),

    #[error("system overloaded: {0}")]
    Overload(String),
}

/// Errors from the agent registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent not found: {0}")]
    NotFound(String),

    #[error("agent unavailable: {0}")]
    Unavailable(String),

    #[error("agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("agent timed out: {0}")]
    Timeout(String),
}

/// Errors from the task scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(Uuid),

    #[error("task invalid: {0}")]
    Invalid(String),

    #[error("task timed out: {0}")]
    Timeout(Uuid),

    #[error("task failed: {0}")]
    Failed(String),
}

/// Errors from bridge-like external collaborators (MCP/A2A are stubs).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("A2A error: {0}")]
    A2a(String),
}

/// Errors from resource governance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("resource exhausted: {0}")]
    Exhausted(String),

    #[error("memory limit exceeded: {usage_mb}MB > {limit_mb}MB")]
    MemoryLimitExceeded { usage_mb: u64, limit_mb: u64 },
}

/// Errors from the consensus manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("consensus failed: {0}")]
    Failed(String),

    #[error("consensus timed out: {0}")]
    Timeout(Uuid),
}

/// Errors from configuration loading and validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl AgentError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl TaskError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl BridgeError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ConnectionFailed(_))
    }
}

impl ConsensusError {
    pub const fn is_transient(&self) -> bool {
        false
    }
}

/// Umbrella error carrying the taxonomy code, a human message, structured
/// context, a timestamp, and whether the operation may be retried.
///
/// User-visible failures should use [`OrchestratorError::code`] and
/// [`OrchestratorError::message`]; internal detail belongs in the
/// `context` map and structured logs, not in the message shown to callers.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct OrchestratorError {
    pub code: ErrorCode,
    pub message: String,
    pub context: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub retryable: bool,
}

/// Stable taxonomy codes (spec.md §7) — not Rust type names, just labels
/// that survive across error-type refactors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SystemNotInitialized,
    SystemShuttingDown,
    SystemOverload,
    AgentNotFound,
    AgentUnavailable,
    AgentExecutionFailed,
    AgentTimeout,
    TaskNotFound,
    TaskInvalid,
    TaskTimeout,
    TaskFailed,
    NetworkError,
    ConnectionFailed,
    ResourceExhausted,
    MemoryLimitExceeded,
    ConsensusFailed,
    ConsensusTimeout,
    BridgeError,
    McpError,
    A2aError,
    ConfigError,
}

impl OrchestratorError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: HashMap::new(),
            timestamp: Utc::now(),
            retryable: false,
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl From<LifecycleError> for OrchestratorError {
    fn from(err: LifecycleError) -> Self {
        let code = match err {
            LifecycleError::NotInitialized => ErrorCode::SystemNotInitialized,
            LifecycleError::ShuttingDown => ErrorCode::SystemShuttingDown,
            LifecycleError::SubsystemInitFailed(..) | LifecycleError::Overload(_) => {
                ErrorCode::SystemOverload
            }
        };
        Self::new(code, err.to_string())
    }
}

impl From<AgentError> for OrchestratorError {
    fn from(err: AgentError) -> Self {
        let retryable = err.is_transient();
        let code = match err {
            AgentError::NotFound(_) => ErrorCode::AgentNotFound,
            AgentError::Unavailable(_) => ErrorCode::AgentUnavailable,
            AgentError::ExecutionFailed(_) => ErrorCode::AgentExecutionFailed,
            AgentError::Timeout(_) => ErrorCode::AgentTimeout,
        };
        Self::new(code, err.to_string()).retryable(retryable)
    }
}

impl From<TaskError> for OrchestratorError {
    fn from(err: TaskError) -> Self {
        let retryable = err.is_transient();
        let code = match err {
            TaskError::NotFound(_) => ErrorCode::TaskNotFound,
            TaskError::Invalid(_) => ErrorCode::TaskInvalid,
            TaskError::Timeout(_) => ErrorCode::TaskTimeout,
            TaskError::Failed(_) => ErrorCode::TaskFailed,
        };
        Self::new(code, err.to_string()).retryable(retryable)
    }
}

impl From<BridgeError> for OrchestratorError {
    fn from(err: BridgeError) -> Self {
        let retryable = err.is_transient();
        let code = match err {
            BridgeError::Network(_) => ErrorCode::NetworkError,
            BridgeError::ConnectionFailed(_) => ErrorCode::ConnectionFailed,
            BridgeError::Mcp(_) => ErrorCode::McpError,
            BridgeError::A2a(_) => ErrorCode::A2aError,
        };
        Self::new(code, err.to_string()).retryable(retryable)
    }
}

impl From<ResourceError> for OrchestratorError {
    fn from(err: ResourceError) -> Self {
        let code = match err {
            ResourceError::Exhausted(_) => ErrorCode::ResourceExhausted,
            ResourceError::MemoryLimitExceeded { .. } => ErrorCode::MemoryLimitExceeded,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ConsensusError> for OrchestratorError {
    fn from(err: ConsensusError) -> Self {
        let code = match err {
            ConsensusError::Failed(_) => ErrorCode::ConsensusFailed,
            ConsensusError::Timeout(_) => ErrorCode::ConsensusTimeout,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ConfigError> for OrchestratorError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorCode::ConfigError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_error_display() {
        let id = Uuid::nil();
        let err = TaskError::NotFound(id);
        assert_eq!(err.to_string(), format!("task not found: {id}"));
    }

    #[test]
    fn agent_error_transience() {
        assert!(AgentError::Timeout("a1".into()).is_transient());
        assert!(!AgentError::NotFound("a1".into()).is_transient());
    }

    #[test]
    fn orchestrator_error_carries_context() {
        let err = OrchestratorError::from(AgentError::Unavailable("a1".into()))
            .with_context("agent_id", "a1");
        assert_eq!(err.code, ErrorCode::AgentUnavailable);
        assert!(err.retryable);
        assert_eq!(err.context.get("agent_id").unwrap(), "a1");
    }

    #[test]
    fn consensus_error_never_retryable() {
        let err = OrchestratorError::from(ConsensusError::Timeout(Uuid::nil()));
        assert!(!err.retryable);
        assert_eq!(err.code, ErrorCode::ConsensusTimeout);
    }
}
