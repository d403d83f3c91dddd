//! # Bridge Error Handling
//!
//! This module defines the [`BridgeError`] enum, which represents the different error
//! kinds that can occur while bridging LoRa uplinks and platform provisioning events.
//! The kinds follow the propagation rules of the error handling design: `Transient`
//! errors are retried by the caller via redelivery, `MalformedInput` and
//! `NotOurConcern` are never retried, `NotProvisioned`/`NotAuthorized` are publish-time
//! policy outcomes, and `Fatal` aborts the process at startup.

use thiserror::Error;

use crate::route_map::StoreError;

/// Represents the different error kinds that can occur in the bridge crate.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A collaborator (route-map store, MQTT broker, bus) failed in a way that
    /// retrying the same operation can plausibly fix. Never acknowledged.
    #[error("transient error during {operation}: {source}")]
    Transient {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The input (event record or MQTT payload) could not be decoded at all.
    /// Acknowledged/discarded; retrying cannot fix a malformed payload.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The event does not carry a LoRa binding and is not this bridge's concern.
    #[error("not a LoRa-bound event: {0}")]
    NotOurConcern(String),

    /// A publish was attempted for an uplink whose channel or thing binding
    /// does not exist in the route maps.
    #[error("not provisioned: {0}")]
    NotProvisioned(String),

    /// A publish was attempted for an uplink whose bindings exist but are not
    /// linked by a live connection.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// An unrecoverable failure at process bootstrap (cannot connect to the
    /// event log, MQTT broker, bus, or route-map store).
    #[error("fatal bootstrap error: {0}")]
    Fatal(String),
}

impl BridgeError {
    /// Wrap an arbitrary error as [`BridgeError::Transient`], tagging it with the
    /// operation name so logs and metrics can attribute the failure.
    pub fn transient(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        BridgeError::Transient {
            operation,
            source: source.into(),
        }
    }

    /// True if this error kind must never be retried (it is acknowledged/discarded
    /// by the caller instead).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BridgeError::Transient { .. })
    }
}

impl From<StoreError> for BridgeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => BridgeError::NotProvisioned("binding not found".to_string()),
            StoreError::Transient(source) => BridgeError::transient("route_map_store", source),
        }
    }
}
