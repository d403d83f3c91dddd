//! Redis-backed [`RouteMapStore`](super::RouteMapStore).
//!
//! Each of the three route maps (`thing`, `channel`, `connection`) gets its
//! own key prefix inside the same Redis database, so a single connection
//! manager can back all three `Service` mutators. `Save` writes both
//! directions of a pair inside one `MULTI`/`EXEC` pipeline so a reader never
//! observes only one half of the link.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{RouteMapStore, StoreError};

/// A route map backed by a prefixed keyspace in a shared Redis connection.
pub struct RedisRouteMapStore {
    conn: ConnectionManager,
    prefix: &'static str,
}

impl RedisRouteMapStore {
    /// Connect to `url` (e.g. `redis://:password@host:port/db`) and scope all
    /// operations under `prefix` (`"thing"`, `"channel"`, or `"connection"`).
    pub async fn connect(url: &str, prefix: &'static str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Transient(anyhow::Error::new(e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Transient(anyhow::Error::new(e)))?;
        Ok(Self { conn, prefix })
    }

    /// Build a scoped from an existing connection manager, for callers that
    /// share one manager across all three route maps.
    pub fn from_connection_manager(conn: ConnectionManager, prefix: &'static str) -> Self {
        Self { conn, prefix }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl RouteMapStore for RedisRouteMapStore {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let nk = self.namespaced(key);
        let nv = self.namespaced(value);

        // Drop any stale reverse links left by a prior Save under either
        // side's old partner before installing the new pair, so a renamed
        // binding never leaves a dangling half-link behind.
        let old_value: Option<String> = conn
            .get(&nk)
            .await
            .map_err(|e| StoreError::Transient(anyhow::Error::new(e)))?;
        let old_key: Option<String> = conn
            .get(&nv)
            .await
            .map_err(|e| StoreError::Transient(anyhow::Error::new(e)))?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        if let Some(old_value) = old_value.filter(|v| v != value) {
            pipe.del(self.namespaced(&old_value));
        }
        if let Some(old_key) = old_key.filter(|k| k != key) {
            pipe.del(self.namespaced(&old_key));
        }
        pipe.set(&nk, value).set(&nv, key);

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Transient(anyhow::Error::new(e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let mut conn = self.conn.clone();
        let nk = self.namespaced(key);
        let value: Option<String> = conn
            .get(&nk)
            .await
            .map_err(|e| StoreError::Transient(anyhow::Error::new(e)))?;
        value.ok_or(StoreError::NotFound)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let nk = self.namespaced(key);
        let value: Option<String> = conn
            .get(&nk)
            .await
            .map_err(|e| StoreError::Transient(anyhow::Error::new(e)))?;

        let Some(value) = value else {
            return Ok(());
        };
        let nv = self.namespaced(&value);

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(&nk).del(&nv);
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Transient(anyhow::Error::new(e)))?;
        Ok(())
    }
}
