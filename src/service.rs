//! # Service
//!
//! The domain facade: applies decoded provisioning events to the three route
//! maps and resolves/publishes uplinks. A facade that owns a handful of
//! pluggable collaborators behind trait objects and exposes one method per
//! domain operation.

use std::sync::Arc;
use std::time::Instant;

use crate::error::BridgeError;
use crate::events::Event;
use crate::ingress::Uplink;
use crate::metrics::{Metrics, Outcome};
use crate::publisher::{OutboundMessage, Publisher};
use crate::route_map::{RouteMapStore, StoreError};

/// Key prefixes used by the three route maps.
pub mod prefix {
    pub const THING: &str = "thing";
    pub const CHANNEL: &str = "channel";
    pub const CONNECTION: &str = "connection";
}

/// Owns the three route maps and the publisher, and exposes the mutators and
/// `Publish`. Cheaply cloneable: every field is an `Arc`,
/// so `EventConsumer` and `MQTTIngress` can each hold their own handle.
#[derive(Clone)]
pub struct Service {
    thing_map: Arc<dyn RouteMapStore>,
    channel_map: Arc<dyn RouteMapStore>,
    connection_map: Arc<dyn RouteMapStore>,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<dyn Metrics>,
}

impl Service {
    pub fn new(
        thing_map: Arc<dyn RouteMapStore>,
        channel_map: Arc<dyn RouteMapStore>,
        connection_map: Arc<dyn RouteMapStore>,
        publisher: Arc<dyn Publisher>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        Self {
            thing_map,
            channel_map,
            connection_map,
            publisher,
            metrics,
        }
    }

    /// Dispatch a decoded event to the matching mutator.
    pub async fn apply_event(&self, event: Event) -> Result<(), BridgeError> {
        match event {
            Event::CreateThing { thing_id, dev_eui } | Event::UpdateThing { thing_id, dev_eui } => {
                self.create_or_update_thing(thing_id, dev_eui).await
            }
            Event::RemoveThing { thing_id } => self.remove_thing(thing_id).await,
            Event::CreateChannel { chan_id, app_id } | Event::UpdateChannel { chan_id, app_id } => {
                self.create_or_update_channel(chan_id, app_id).await
            }
            Event::RemoveChannel { chan_id } => self.remove_channel(chan_id).await,
            Event::ConnectThing { chan_id, thing_id } => self.connect_thing(chan_id, thing_id).await,
            Event::DisconnectThing { chan_id, thing_id } => {
                self.disconnect_thing(chan_id, thing_id).await
            }
        }
    }

    pub async fn create_or_update_thing(
        &self,
        thing_id: String,
        dev_eui: String,
    ) -> Result<(), BridgeError> {
        self.thing_map.save(&thing_id, &dev_eui).await?;
        Ok(())
    }

    pub async fn remove_thing(&self, thing_id: String) -> Result<(), BridgeError> {
        self.thing_map.remove(&thing_id).await?;
        Ok(())
    }

    pub async fn create_or_update_channel(
        &self,
        chan_id: String,
        app_id: String,
    ) -> Result<(), BridgeError> {
        self.channel_map.save(&chan_id, &app_id).await?;
        Ok(())
    }

    pub async fn remove_channel(&self, chan_id: String) -> Result<(), BridgeError> {
        self.channel_map.remove(&chan_id).await?;
        Ok(())
    }

    pub async fn connect_thing(&self, chan_id: String, thing_id: String) -> Result<(), BridgeError> {
        self.connection_map.save(&chan_id, &thing_id).await?;
        Ok(())
    }

    /// Remove the connection binding `chanID <-> thingID`, but only if the
    /// store's current pair actually matches the event's pair. An event
    /// naming a pair that no longer matches what is stored (the connection
    /// was already replaced by a newer `ConnectThing`, or never existed) is
    /// a no-op: removing by `chanID` alone would otherwise tear down an
    /// unrelated, newer connection under redelivery or reordering.
    pub async fn disconnect_thing(
        &self,
        chan_id: String,
        thing_id: String,
    ) -> Result<(), BridgeError> {
        match self.connection_map.get(&chan_id).await {
            Ok(bound_thing) if bound_thing == thing_id => {
                self.connection_map.remove(&chan_id).await?;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve and publish an uplink. Looks up the channel by
    /// `appID` and the thing by `devEUI`, verifies a connection links them,
    /// then hands the outbound record to the publisher.
    pub async fn publish(&self, uplink: Uplink) -> Result<(), BridgeError> {
        let started = Instant::now();
        let result = self.publish_inner(uplink).await;
        let outcome = match &result {
            Ok(()) => Outcome::Ok,
            Err(BridgeError::NotProvisioned(_)) => Outcome::NotProvisioned,
            Err(BridgeError::NotAuthorized(_)) => Outcome::NotAuthorized,
            Err(BridgeError::Transient { .. }) => Outcome::Transient,
            Err(_) => Outcome::MalformedInput,
        };
        self.metrics.record("publish", outcome, started.elapsed());
        result
    }

    async fn publish_inner(&self, uplink: Uplink) -> Result<(), BridgeError> {
        let chan_id = match self.channel_map.get(&uplink.app_id).await {
            Ok(chan_id) => chan_id,
            Err(StoreError::NotFound) => {
                return Err(BridgeError::NotProvisioned(format!(
                    "no channel bound to appID {}",
                    uplink.app_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let thing_id = match self.thing_map.get(&uplink.dev_eui).await {
            Ok(thing_id) => thing_id,
            Err(StoreError::NotFound) => {
                return Err(BridgeError::NotProvisioned(format!(
                    "no thing bound to devEUI {}",
                    uplink.dev_eui
                )))
            }
            Err(e) => return Err(e.into()),
        };

        match self.connection_map.get(&chan_id).await {
            Ok(bound_thing) if bound_thing == thing_id => {}
            Ok(_) => {
                return Err(BridgeError::NotAuthorized(format!(
                    "channel {chan_id} is not connected to thing {thing_id}"
                )))
            }
            Err(StoreError::NotFound) => {
                return Err(BridgeError::NotAuthorized(format!(
                    "channel {chan_id} has no connection"
                )))
            }
            Err(e) => return Err(e.into()),
        }

        let message = OutboundMessage {
            chan_id,
            thing_id,
            payload: uplink.payload,
            content_type: OutboundMessage::DEFAULT_CONTENT_TYPE.to_string(),
        };
        self.publisher.publish(message).await
    }
}
