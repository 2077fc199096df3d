//! Runtime configuration, loaded from a JSON document and merged onto a
//! built-in default. Top-level sections mirror the on-disk document:
//! `system`, `networking`, `mesh`, `swarm`, `consensus`, `bridges`, `gpu`.
//! Unknown top-level keys are ignored by construction — they simply have no
//! matching field to land in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub system: SystemConfig,
    pub networking: NetworkingConfig,
    pub mesh: MeshConfig,
    pub swarm: SwarmConfig,
    pub consensus: ConsensusConfig,
    pub bridges: BridgesConfig,
    pub gpu: GpuConfig,
    pub resources: ResourceLimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            networking: NetworkingConfig::default(),
            mesh: MeshConfig::default(),
            swarm: SwarmConfig::default(),
            consensus: ConsensusConfig::default(),
            bridges: BridgesConfig::default(),
            gpu: GpuConfig::default(),
            resources: ResourceLimitsConfig::default(),
        }
    }
}

/// Process-wide limits and the logging knobs (`log level override` in the
/// external-interfaces contract lives here, not in a separate section).
///
/// `heartbeat_interval_ms` is the registry's liveness staleness threshold —
/// a record not updated within this window is marked Offline by the
/// liveness scan. The scan cadence itself (30s) and the synthetic-idle-
/// heartbeat cadence/threshold (20s / 45s) are fixed constants, not
/// separately configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub max_agents: usize,
    pub heartbeat_interval_ms: u64,
    pub log_level: String,
    pub log_format: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_agents: 10,
            heartbeat_interval_ms: 90_000,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkingConfig {
    pub default_port: u16,
}

impl Default for NetworkingConfig {
    fn default() -> Self {
        Self { default_port: 7630 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub max_connections: usize,
    pub max_run_duration_ms: u64,
    pub desired_node_count: Option<usize>,
    pub topology: Option<String>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            max_run_duration_ms: 3_600_000,
            desired_node_count: None,
            topology: None,
        }
    }
}

/// The swarm CLI surface only starts/stops/configures the mesh's dynamic
/// updates (spec §6); this section just carries the run-duration override
/// applied when `swarm start` is used instead of a direct mesh configure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub max_run_duration_ms: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_run_duration_ms: 3_600_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub min_votes: usize,
    pub timeout_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_votes: 1,
            timeout_ms: 30_000,
        }
    }
}

/// MCP/A2A are stubs at this layer (spec §9) — only endpoint metadata is
/// carried, never dialed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgesConfig {
    pub mcp_endpoint: Option<String>,
    pub a2a_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub probe_cache_ttl_ms: u64,
    pub disable_probe_cache: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            probe_cache_ttl_ms: 300_000,
            disable_probe_cache: false,
        }
    }
}

/// Limits the Resource Manager samples against (spec.md §4.6). Exceeding
/// `max_memory_mb` feeds the hysteresis state machine; the other fields are
/// plain counters checked against their ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimitsConfig {
    pub max_memory_mb: u64,
    pub max_cpu_percent: f64,
    pub max_active_agents: usize,
    pub max_concurrent_tasks: usize,
    pub max_requests_per_minute: u32,
    pub sample_interval_ms: u64,
}

impl Default for ResourceLimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 2048,
            max_cpu_percent: 90.0,
            max_active_agents: 10,
            max_concurrent_tasks: 50,
            max_requests_per_minute: 600,
            sample_interval_ms: 10_000,
        }
    }
}
