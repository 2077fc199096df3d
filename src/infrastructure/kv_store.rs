//! Optional namespaced key-value store (spec §6). Backing choice is
//! explicitly not observable beyond durability, so an in-memory map is a
//! conforming implementation; nothing else in the crate depends on this
//! being persistent.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct KvMetrics {
    pub namespaces: usize,
    pub keys: usize,
}

#[derive(Default)]
pub struct InMemoryKvStore {
    namespaces: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, namespace: &str, key: &str, value: Value) {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub async fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let namespaces = self.namespaces.read().await;
        namespaces.get(namespace)?.get(key).cloned()
    }

    pub async fn delete(&self, namespace: &str, key: &str) -> bool {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(key).is_some())
    }

    pub async fn metrics(&self) -> KvMetrics {
        let namespaces = self.namespaces.read().await;
        KvMetrics {
            namespaces: namespaces.len(),
            keys: namespaces.values().map(HashMap::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = InMemoryKvStore::new();
        store.set("ns", "key", Value::from(42)).await;
        assert_eq!(store.get("ns", "key").await, Some(Value::from(42)));
    }

    #[tokio::test]
    async fn delete_removes_key_and_reports_absence() {
        let store = InMemoryKvStore::new();
        store.set("ns", "key", Value::from(true)).await;
        assert!(store.delete("ns", "key").await);
        assert_eq!(store.get("ns", "key").await, None);
        assert!(!store.delete("ns", "key").await);
    }

    #[tokio::test]
    async fn metrics_count_namespaces_and_keys() {
        let store = InMemoryKvStore::new();
        store.set("a", "k1", Value::Null).await;
        store.set("a", "k2", Value::Null).await;
        store.set("b", "k1", Value::Null).await;
        let metrics = store.metrics().await;
        assert_eq!(metrics.namespaces, 2);
        assert_eq!(metrics.keys, 3);
    }
}
