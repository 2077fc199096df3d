//! Resource and health domain model: sampled snapshots, the memory
//! hysteresis state machine, and health check results. Sampling itself
//! (reading RSS/CPU from the OS) lives in `runtime::resource_manager`.

use serde::{Deserialize, Serialize};

/// Hysteresis bands that prevent state flapping: Normal->Elevated above
/// 0.80, Elevated->Critical above 0.93, Critical->Elevated below 0.88,
/// Elevated->Normal below 0.72. No transition happens outside these bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryState {
    Normal,
    Elevated,
    Critical,
}

impl MemoryState {
    /// Advances the state machine given the current usage ratio
    /// (`rss_mb / limit_mb`). Pure function: same inputs always produce the
    /// same transition, which is what makes invariant 9 testable in
    /// isolation from any real memory sampling.
    #[must_use]
    pub fn next(self, usage_ratio: f64) -> Self {
        match self {
            Self::Normal => {
                if usage_ratio > 0.80 {
                    Self::Elevated
                } else {
                    Self::Normal
                }
            }
            Self::Elevated => {
                if usage_ratio > 0.93 {
                    Self::Critical
                } else if usage_ratio < 0.72 {
                    Self::Normal
                } else {
                    Self::Elevated
                }
            }
            Self::Critical => {
                if usage_ratio < 0.88 {
                    Self::Elevated
                } else {
                    Self::Critical
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MemoryBreakdown {
    pub rss_mb: u64,
    pub heap_mb: u64,
    pub external_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub memory: MemoryBreakdown,
    pub memory_state: MemoryState,
    pub memory_usage_mb: u64,
    pub memory_limit_mb: u64,
    pub memory_headroom_mb: i64,
    pub cpu_percent: f64,
    pub active_agents: usize,
    pub concurrent_tasks: usize,
    pub requests_last_minute: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub details: serde_json::Value,
}

impl HealthCheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Pass,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Fail,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Worst-of across a set of named checks: Fail beats Warn beats Pass.
    pub fn overall(results: &[Self]) -> CheckStatus {
        if results.iter().any(|r| r.status == CheckStatus::Fail) {
            CheckStatus::Fail
        } else if results.iter().any(|r| r.status == CheckStatus::Warn) {
            CheckStatus::Warn
        } else {
            CheckStatus::Pass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_state_does_not_flap_within_band() {
        let state = MemoryState::Elevated;
        assert_eq!(state.next(0.85), MemoryState::Elevated);
    }

    #[test]
    fn memory_state_escalates_past_high_band() {
        assert_eq!(MemoryState::Normal.next(0.81), MemoryState::Elevated);
        assert_eq!(MemoryState::Elevated.next(0.94), MemoryState::Critical);
    }

    #[test]
    fn memory_state_recovers_past_low_band() {
        assert_eq!(MemoryState::Critical.next(0.87), MemoryState::Elevated);
        assert_eq!(MemoryState::Elevated.next(0.71), MemoryState::Normal);
    }

    #[test]
    fn critical_stays_critical_above_recovery_band() {
        assert_eq!(MemoryState::Critical.next(0.90), MemoryState::Critical);
    }

    #[test]
    fn overall_status_is_worst_of_all_checks() {
        let results = vec![
            HealthCheckResult::pass("a", "ok"),
            HealthCheckResult::warn("b", "degraded"),
        ];
        assert_eq!(HealthCheckResult::overall(&results), CheckStatus::Warn);
    }
}
