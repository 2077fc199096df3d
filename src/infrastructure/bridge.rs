//! Bridge transport boundary. MCP/A2A wire protocols are out of scope
//! (spec §6, §9) — they exist in the source as stubs that log and return
//! canned values, so that's what this trait's default implementation does.
//! Real transports can be plugged in later by implementing `BridgeTransport`
//! without touching anything that calls `send_message`.

use crate::domain::error::BridgeError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

#[async_trait]
pub trait BridgeTransport: Send + Sync {
    async fn send_message(&self, endpoint: &str, payload: Value) -> Result<Value, BridgeError>;
}

/// Logs the call and returns an empty object — the stub behavior the
/// teacher's MCP/A2A modules use, kept here as a trait boundary rather than
/// real wire code.
#[derive(Debug, Default)]
pub struct NoopBridgeTransport;

#[async_trait]
impl BridgeTransport for NoopBridgeTransport {
    async fn send_message(&self, endpoint: &str, payload: Value) -> Result<Value, BridgeError> {
        warn!(endpoint, ?payload, "bridge transport not configured, returning stub response");
        Ok(Value::Object(serde_json::Map::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_transport_returns_empty_object() {
        let transport = NoopBridgeTransport;
        let response = transport.send_message("mcp://example", Value::Null).await.unwrap();
        assert_eq!(response, Value::Object(serde_json::Map::new()));
    }
}
