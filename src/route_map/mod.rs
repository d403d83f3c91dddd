//! # Route Map Store
//!
//! A route map is a persistent, bidirectional key/value projection keyed by a
//! per-map prefix (`thing`, `channel`, `connection`). It is not a cache: it is
//! the authoritative mapping between a platform identifier and a LoRa
//! identifier (or, for the connection map, between a platform channel and a
//! platform thing). The store itself — Redis in production — is an external
//! collaborator; this module owns only the trait and the adapters.
//!
//! A trait implemented by a pluggable backend, reached through a small
//! dispatch surface, with an in-memory implementation used for tests.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a [`RouteMapStore`] backend can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Neither side of the requested key has a stored mapping. Not an error
    /// condition callers need to retry — a fresh key legitimately has no
    /// mapping yet.
    #[error("key not found")]
    NotFound,

    /// Any other failure (connection reset, timeout, I/O error). Callers
    /// must retry via redelivery rather than treat this as a terminal
    /// rejection.
    #[error("transient store error: {0}")]
    Transient(#[source] anyhow::Error),
}

/// Contract for one route map prefix (`thing`, `channel`, or `connection`).
///
/// Implementations must provide per-key linearizable reads and writes;
/// cross-key atomicity is not required. `Save` stores
/// both `key -> value` and `value -> key` and overwrites any prior mapping
/// for either side. `Remove` is idempotent: removing an absent key succeeds.
#[async_trait]
pub trait RouteMapStore: Send + Sync {
    /// Store `key <-> value` atomically, overwriting any prior mapping on
    /// either side.
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Look up a value by either side of a stored pair.
    async fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Remove both directions of the mapping for `key`. Succeeds even if no
    /// mapping exists.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
