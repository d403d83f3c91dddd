//! # Publisher
//!
//! Thin adapter that serializes a resolved [`OutboundMessage`] into the
//! platform's wire envelope and hands it to the internal message bus. A
//! narrow `publish` contract behind a trait object, so `Service` never
//! depends on the bus client directly.

pub mod nats;

use async_trait::async_trait;

use crate::error::BridgeError;

/// A resolved, ready-to-send record: everything `Service::publish` worked out
/// about an uplink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chan_id: String,
    pub thing_id: String,
    pub payload: Vec<u8>,
    pub content_type: String,
}

impl OutboundMessage {
    pub const DEFAULT_CONTENT_TYPE: &'static str = "application/senml+json";
    pub const SUBTOPIC: &'static str = "lora";
    pub const PROTOCOL: &'static str = "lora";
}

/// Contract for handing a resolved message to the internal bus. Failures are
/// always [`BridgeError::Transient`]: a send either succeeds or is retried by
/// the caller, never treated as a terminal rejection.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<(), BridgeError>;
}
