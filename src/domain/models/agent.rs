//! Agent domain model: identity, capability, and the registry's owned record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Closed set of agent kinds the registry recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    CodeWorker,
    DataWorker,
    ValidationWorker,
    SwarmCoordinator,
    ConsensusCoordinator,
    TopologyCoordinator,
    McpBridge,
    A2aBridge,
}

/// Stable, process-lifetime-unique identity. `id` is never reused after
/// unregistration even if a new agent later picks the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: String,
    pub kind: AgentKind,
    pub version: String,
}

impl AgentIdentity {
    pub fn new(id: impl Into<String>, kind: AgentKind, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            version: version.into(),
        }
    }
}

/// A named, versioned competence an agent declares at registration.
/// Capability sets are immutable after registration — there is no `update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

impl Capability {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            parameters: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Declared resource requirements for an agent. Not enforced as hard
/// admission control by the registry itself — the Resource Manager reads
/// the aggregate across active agents to compute `ResourceSnapshot`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub cpu_cores: f64,
    pub memory_mb: u64,
    pub storage_mb: u64,
    pub bandwidth_mbps: u64,
}

/// How to reach an agent. Transport is opaque to the core (spec.md §6) —
/// this is metadata only, never dialed by the registry itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub endpoint: Option<String>,
    pub protocol: Option<String>,
}

/// Fixed status machine for an [`AgentRecord`]. Only the registry mutates
/// this field; every transition updates `last_updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Initializing,
    Running,
    Idle,
    Busy,
    Error,
    ShuttingDown,
    Offline,
}

impl AgentStatus {
    /// Status values from which the scheduler may assign new tasks.
    pub const fn is_assignable(self) -> bool {
        matches!(self, Self::Idle | Self::Running)
    }

    /// Status values counted by `listAvailable()`.
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Idle | Self::Running)
    }
}

/// The registry's owned record for one agent. External callers only ever
/// see value copies of this — never a reference into the registry's map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub identity: AgentIdentity,
    pub capabilities: Vec<Capability>,
    pub requirements: ResourceRequirements,
    pub network: NetworkDescriptor,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl AgentRecord {
    pub fn new(identity: AgentIdentity, capabilities: Vec<Capability>) -> Self {
        let now = Utc::now();
        Self {
            identity,
            capabilities,
            requirements: ResourceRequirements::default(),
            network: NetworkDescriptor::default(),
            status: AgentStatus::Initializing,
            created_at: now,
            last_updated_at: now,
        }
    }

    #[must_use]
    pub const fn with_requirements(mut self, requirements: ResourceRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    #[must_use]
    pub fn with_network(mut self, network: NetworkDescriptor) -> Self {
        self.network = network;
        self
    }

    /// Whether this agent declares every capability named in `required`.
    pub fn has_capabilities(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|name| self.capabilities.iter().any(|c| &c.name == name))
    }

    pub fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }

    pub fn set_status(&mut self, status: AgentStatus) {
        self.status = status;
        self.touch();
    }
}
