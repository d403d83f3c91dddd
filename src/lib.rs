//! # lora-bridge
//!
//! Bridges a LoRaWAN network server and an internal IoT messaging bus.
//! Uplinks published by the LoRa network server on MQTT are translated into
//! the platform's native message envelope and forwarded to the internal bus.
//! Provisioning events (thing/channel create, update, remove, connect,
//! disconnect) are consumed from an append-only event log and used to
//! maintain the route maps that let the bridge resolve LoRa-side identifiers
//! to platform-side identifiers at publish time.

pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod ingress;
pub mod logging;
pub mod metrics;
pub mod publisher;
pub mod route_map;
pub mod service;
pub mod supervisor;

pub use crate::config::Config;
pub use crate::error::BridgeError;
pub use crate::service::Service;
pub use crate::supervisor::Supervisor;
