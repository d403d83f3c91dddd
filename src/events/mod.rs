//! # Provisioning Events
//!
//! Tagged variant for the platform entity-management events this bridge
//! cares about: a small enum discriminant with one decoding site, rather
//! than trait-object polymorphism over the raw field bag.

pub mod consumer;
pub mod decoder;

/// A decoded, LoRa-bound provisioning event. Every variant carries exactly
/// the binding the corresponding `Service` mutator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CreateThing { thing_id: String, dev_eui: String },
    UpdateThing { thing_id: String, dev_eui: String },
    RemoveThing { thing_id: String },
    CreateChannel { chan_id: String, app_id: String },
    UpdateChannel { chan_id: String, app_id: String },
    RemoveChannel { chan_id: String },
    ConnectThing { chan_id: String, thing_id: String },
    DisconnectThing { chan_id: String, thing_id: String },
}

impl Event {
    /// Operation name used for metrics/logging.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Event::CreateThing { .. } => "create_thing",
            Event::UpdateThing { .. } => "update_thing",
            Event::RemoveThing { .. } => "remove_thing",
            Event::CreateChannel { .. } => "create_channel",
            Event::UpdateChannel { .. } => "update_channel",
            Event::RemoveChannel { .. } => "remove_channel",
            Event::ConnectThing { .. } => "connect_thing",
            Event::DisconnectThing { .. } => "disconnect_thing",
        }
    }
}
