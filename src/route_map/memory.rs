//! In-memory [`RouteMapStore`](super::RouteMapStore) used by tests and as a
//! reference implementation standing in for a real backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RouteMapStore, StoreError};

/// A bidirectional `key <-> value` mapping held entirely in process memory.
/// Reads and writes are linearized by a single mutex; this is sufficient
/// for the per-key linearizability the store contract requires, since we
/// do not need cross-key atomicity.
#[derive(Default)]
pub struct InMemoryRouteMapStore {
    pairs: Mutex<HashMap<String, String>>,
}

impl InMemoryRouteMapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RouteMapStore for InMemoryRouteMapStore {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut pairs = self.pairs.lock().unwrap();

        // Overwriting either side must drop the stale reverse mapping it
        // used to own, or a removed/renamed pair would leave a dangling
        // half-link behind.
        if let Some(old_value) = pairs.get(key).cloned() {
            pairs.remove(&old_value);
        }
        if let Some(old_key) = pairs.get(value).cloned() {
            pairs.remove(&old_key);
        }

        pairs.insert(key.to_string(), value.to_string());
        pairs.insert(value.to_string(), key.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let pairs = self.pairs.lock().unwrap();
        pairs.get(key).cloned().ok_or(StoreError::NotFound)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut pairs = self.pairs.lock().unwrap();
        if let Some(value) = pairs.remove(key) {
            pairs.remove(&value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_get_is_bidirectional() {
        let store = InMemoryRouteMapStore::new();
        store.save("thingA", "eui1").await.unwrap();

        assert_eq!(store.get("thingA").await.unwrap(), "eui1");
        assert_eq!(store.get("eui1").await.unwrap(), "thingA");
    }

    #[tokio::test]
    async fn get_on_unseen_key_is_not_found() {
        let store = InMemoryRouteMapStore::new();
        assert!(matches!(store.get("missing").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = InMemoryRouteMapStore::new();
        store.save("thingA", "eui1").await.unwrap();

        store.remove("thingA").await.unwrap();
        assert!(matches!(store.get("thingA").await, Err(StoreError::NotFound)));
        assert!(matches!(store.get("eui1").await, Err(StoreError::NotFound)));

        // Removing an absent key is success, not an error.
        store.remove("thingA").await.unwrap();
    }

    #[tokio::test]
    async fn save_overwrites_prior_mapping_on_either_side() {
        let store = InMemoryRouteMapStore::new();
        store.save("thingA", "eui1").await.unwrap();
        store.save("thingA", "eui2").await.unwrap();

        assert_eq!(store.get("thingA").await.unwrap(), "eui2");
        assert!(matches!(store.get("eui1").await, Err(StoreError::NotFound)));
        assert_eq!(store.get("eui2").await.unwrap(), "thingA");
    }

    #[tokio::test]
    async fn repeated_identical_save_is_idempotent() {
        let store = InMemoryRouteMapStore::new();
        store.save("thingA", "eui1").await.unwrap();
        store.save("thingA", "eui1").await.unwrap();

        assert_eq!(store.get("thingA").await.unwrap(), "eui1");
        assert_eq!(store.get("eui1").await.unwrap(), "thingA");
    }
}
