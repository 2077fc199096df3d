//! Circuit breaker wrapping bridge-like external calls. Ported from the
//! teacher's `services::circuit_breaker` and narrowed to the single
//! `Closed/Open/HalfOpen` per-scope machine the bridge boundary needs —
//! the teacher's task-chain recovery-policy layer has no counterpart here.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    fn record_failure(&mut self, config: &CircuitBreakerConfig) {
        self.consecutive_failures += 1;
        if self.state == CircuitState::HalfOpen || self.consecutive_failures >= config.failure_threshold {
            self.state = CircuitState::Open;
            self.opened_at = Some(Utc::now());
        }
    }

    fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    fn allows(&mut self, config: &CircuitBreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed_ok = self
                    .opened_at
                    .is_some_and(|opened_at| Utc::now() > opened_at + config.open_timeout);
                if elapsed_ok {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Per-endpoint circuit breakers guarding `BridgeTransport` calls.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    circuits: RwLock<HashMap<String, Circuit>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: RwLock::new(HashMap::new()),
        }
    }

    pub async fn allows(&self, endpoint: &str) -> bool {
        let mut circuits = self.circuits.write().await;
        circuits.entry(endpoint.to_string()).or_insert_with(Circuit::new).allows(&self.config)
    }

    pub async fn record_failure(&self, endpoint: &str) {
        let mut circuits = self.circuits.write().await;
        circuits
            .entry(endpoint.to_string())
            .or_insert_with(Circuit::new)
            .record_failure(&self.config);
    }

    pub async fn record_success(&self, endpoint: &str) {
        let mut circuits = self.circuits.write().await;
        if let Some(circuit) = circuits.get_mut(endpoint) {
            circuit.record_success();
        }
    }

    pub async fn state(&self, endpoint: &str) -> CircuitState {
        self.circuits
            .read()
            .await
            .get(endpoint)
            .map_or(CircuitState::Closed, |c| c.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: Duration::seconds(60),
        });
        registry.record_failure("ep").await;
        assert!(registry.allows("ep").await);
        registry.record_failure("ep").await;
        assert_eq!(registry.state("ep").await, CircuitState::Open);
        assert!(!registry.allows("ep").await);
    }

    #[tokio::test]
    async fn success_resets_circuit() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::seconds(60),
        });
        registry.record_failure("ep").await;
        assert_eq!(registry.state("ep").await, CircuitState::Open);
        registry.record_success("ep").await;
        assert_eq!(registry.state("ep").await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_circuit() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::milliseconds(-1),
        });
        registry.record_failure("ep").await;
        assert!(registry.allows("ep").await);
        assert_eq!(registry.state("ep").await, CircuitState::HalfOpen);
        registry.record_failure("ep").await;
        assert_eq!(registry.state("ep").await, CircuitState::Open);
    }
}
