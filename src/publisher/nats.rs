//! NATS-backed [`Publisher`], deriving one subject per channel and serializing
//! the outbound record into the platform's wire envelope before publishing.

use async_trait::async_trait;
use serde::Serialize;

use super::{OutboundMessage, Publisher};
use crate::error::BridgeError;

/// The platform's wire envelope, serialized as the NATS message body.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    channel: &'a str,
    publisher: &'a str,
    protocol: &'a str,
    subtopic: &'a str,
    content_type: &'a str,
    payload: &'a [u8],
    created: i64,
}

pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub async fn connect(url: &str) -> Result<Self, BridgeError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BridgeError::transient("nats_connect", e))?;
        Ok(Self { client })
    }

    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }

    fn subject(chan_id: &str) -> String {
        format!("channels.{chan_id}.messages.lora")
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), BridgeError> {
        let envelope = Envelope {
            channel: &message.chan_id,
            publisher: &message.thing_id,
            protocol: OutboundMessage::PROTOCOL,
            subtopic: OutboundMessage::SUBTOPIC,
            content_type: &message.content_type,
            payload: &message.payload,
            created: chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        };

        let body = serde_json::to_vec(&envelope)
            .map_err(|e| BridgeError::transient("encode_envelope", e))?;

        self.client
            .publish(Self::subject(&message.chan_id), body.into())
            .await
            .map_err(|e| BridgeError::transient("nats_publish", e))?;
        Ok(())
    }
}
