//! Neural mesh domain model: nodes and directed, weighted connections
//! between registered agents. The mesh engine that rebuilds and decays
//! these lives in `runtime::mesh`; this module only owns the data shape.

use super::agent::AgentIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Sync,
    Async,
    Stream,
}

/// A directed edge from the owning [`MeshNode`] to `target`. `weight` is
/// kept in `(0, 1]` by construction and decays geometrically when idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub target: AgentIdentity,
    weight: f64,
    pub kind: ConnectionKind,
    pub protocol_tag: String,
    pub last_activity: DateTime<Utc>,
}

impl Connection {
    /// Clamps `weight` into `(0, 1]` so callers can't construct an invalid
    /// edge even with a bad random draw.
    pub fn new(target: AgentIdentity, weight: f64, kind: ConnectionKind, protocol_tag: impl Into<String>) -> Self {
        Self {
            target,
            weight: weight.clamp(f64::EPSILON, 1.0),
            kind,
            protocol_tag: protocol_tag.into(),
            last_activity: Utc::now(),
        }
    }

    pub const fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle_after: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_activity) > idle_after
    }

    /// Geometric decay applied once per tick to idle connections.
    pub fn decay(&mut self, factor: f64) {
        self.weight = (self.weight * factor).clamp(f64::EPSILON, 1.0);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}

/// One mesh node per registered agent; `position` is cosmetic (spec §9 open
/// question — reserved for a future distance-based selection policy) and no
/// scheduling or mesh-rebuild logic reads it today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshNode {
    pub agent: AgentIdentity,
    pub position: [f64; 3],
    pub connections: Vec<Connection>,
    pub last_update: DateTime<Utc>,
}

impl MeshNode {
    pub fn new(agent: AgentIdentity, position: [f64; 3]) -> Self {
        Self {
            agent,
            position,
            connections: Vec::new(),
            last_update: Utc::now(),
        }
    }

    pub fn set_connections(&mut self, connections: Vec<Connection>) {
        self.connections = connections;
        self.last_update = Utc::now();
    }

    pub fn average_connection_weight(&self) -> f64 {
        if self.connections.is_empty() {
            return 0.0;
        }
        self.connections.iter().map(Connection::weight).sum::<f64>() / self.connections.len() as f64
    }
}
