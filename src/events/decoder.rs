//! # Event Decoder
//!
//! Converts a raw event-log record (a field bag with string keys) into a
//! decoded [`Event`] or a non-fatal rejection. The decoder is the only site
//! that touches the raw field bag; everything downstream works with the
//! typed [`Event`] variant.

use std::collections::HashMap;

use serde::Deserialize;

use super::Event;
use crate::error::BridgeError;

/// A raw event-log record: the field bag as read off the stream.
pub type RawEventRecord = HashMap<String, String>;

/// Why a record was rejected without being retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The entity's metadata carries no `lora` section — this event is
    /// about a non-LoRa entity and is not this bridge's business.
    MissingLoraBinding,
    /// A `lora` section is present but is not a JSON object.
    MalformedMetadata,
    /// A required id/EUI/appID field is missing or empty.
    MissingField(&'static str),
}

/// Result of decoding one raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Decoded(Event),
    Skipped(SkipReason),
}

#[derive(Deserialize)]
struct Metadata {
    lora: Option<serde_json::Value>,
}

/// Decode one raw event-log record.
///
/// Returns `Ok(DecodeOutcome::Skipped(..))` for non-fatal rejections (the
/// caller acknowledges and moves on). Any other failure — an unparseable
/// record shape or an operation tag outside the recognized set — is
/// surfaced as [`BridgeError::Transient`]: the upstream event-management
/// service and this decoder are expected to agree on the event taxonomy, so
/// a mismatch is a bridge-side bug worth retrying (and alerting on) rather
/// than silently dropping.
pub fn decode(record: &RawEventRecord) -> Result<DecodeOutcome, BridgeError> {
    let operation = record.get("operation").ok_or_else(|| {
        BridgeError::transient("decode_event", anyhow::anyhow!("record missing `operation`"))
    })?;

    match operation.as_str() {
        "thing.create" | "thing.update" => decode_thing_upsert(record, operation == "thing.create"),
        "thing.remove" => decode_required_id(record).map(|thing_id| {
            DecodeOutcome::Decoded(Event::RemoveThing { thing_id })
        }),
        "channel.create" | "channel.update" => {
            decode_channel_upsert(record, operation == "channel.create")
        }
        "channel.remove" => decode_required_id(record).map(|chan_id| {
            DecodeOutcome::Decoded(Event::RemoveChannel { chan_id })
        }),
        "thing.connect" => decode_connection(record).map(|(chan_id, thing_id)| {
            DecodeOutcome::Decoded(Event::ConnectThing { chan_id, thing_id })
        }),
        "thing.disconnect" => decode_connection(record).map(|(chan_id, thing_id)| {
            DecodeOutcome::Decoded(Event::DisconnectThing { chan_id, thing_id })
        }),
        other => Err(BridgeError::transient(
            "decode_event",
            anyhow::anyhow!("unrecognized operation tag: {other}"),
        )),
    }
}

fn decode_required_id(record: &RawEventRecord) -> Result<String, BridgeError> {
    let id = record
        .get("id")
        .map(|s| s.as_str())
        .unwrap_or("")
        .to_string();
    if id.is_empty() {
        return Err(decode_skip(SkipReason::MissingField("id")));
    }
    Ok(id)
}

fn decode_connection(record: &RawEventRecord) -> Result<(String, String), BridgeError> {
    let chan_id = record.get("chan_id").cloned().unwrap_or_default();
    let thing_id = record.get("thing_id").cloned().unwrap_or_default();
    if chan_id.is_empty() {
        return Err(decode_skip(SkipReason::MissingField("chan_id")));
    }
    if thing_id.is_empty() {
        return Err(decode_skip(SkipReason::MissingField("thing_id")));
    }
    Ok((chan_id, thing_id))
}

fn decode_thing_upsert(record: &RawEventRecord, is_create: bool) -> Result<DecodeOutcome, BridgeError> {
    let thing_id = decode_required_id(record)?;
    let dev_eui = match extract_lora_field(record, "dev_eui")? {
        Some(v) => v,
        None => return Ok(DecodeOutcome::Skipped(SkipReason::MissingLoraBinding)),
    };
    if dev_eui.is_empty() {
        return Ok(DecodeOutcome::Skipped(SkipReason::MissingField("dev_eui")));
    }
    Ok(DecodeOutcome::Decoded(if is_create {
        Event::CreateThing { thing_id, dev_eui }
    } else {
        Event::UpdateThing { thing_id, dev_eui }
    }))
}

fn decode_channel_upsert(
    record: &RawEventRecord,
    is_create: bool,
) -> Result<DecodeOutcome, BridgeError> {
    let chan_id = match decode_required_id(record) {
        Ok(id) => id,
        Err(BridgeError::MalformedInput(_)) | Err(BridgeError::NotOurConcern(_)) => {
            return Err(decode_skip(SkipReason::MissingField("id")))
        }
        Err(other) => return Err(other),
    };
    let app_id = match extract_lora_field(record, "app_id")? {
        Some(v) => v,
        None => return Ok(DecodeOutcome::Skipped(SkipReason::MissingLoraBinding)),
    };
    if app_id.is_empty() {
        return Ok(DecodeOutcome::Skipped(SkipReason::MissingField("app_id")));
    }
    Ok(DecodeOutcome::Decoded(if is_create {
        Event::CreateChannel { chan_id, app_id }
    } else {
        Event::UpdateChannel { chan_id, app_id }
    }))
}

/// Extract `metadata.lora.<field>` from the record's `metadata` JSON string.
/// `Ok(None)` means "no `lora` section at all" (`MissingLoraBinding`).
/// A `lora` section that isn't a JSON object is `MalformedMetadata`.
fn extract_lora_field(record: &RawEventRecord, field: &'static str) -> Result<Option<String>, BridgeError> {
    let Some(raw_metadata) = record.get("metadata") else {
        return Ok(None);
    };
    if raw_metadata.trim().is_empty() {
        return Ok(None);
    }

    let metadata: Metadata = serde_json::from_str(raw_metadata)
        .map_err(|_| decode_skip(SkipReason::MalformedMetadata))?;

    let Some(lora) = metadata.lora else {
        return Ok(None);
    };
    let Some(lora_obj) = lora.as_object() else {
        return Err(decode_skip(SkipReason::MalformedMetadata));
    };

    Ok(lora_obj
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string()))
}

/// Rejections are modeled as `BridgeError` variants internally so the helper
/// functions can use `?`, then unwrapped back into a `DecodeOutcome::Skipped`
/// by `decode`'s callers. `MissingField`/`MalformedMetadata` map to
/// `MalformedInput`; `MissingLoraBinding` is handled inline above since it is
/// never an error path.
fn decode_skip(reason: SkipReason) -> BridgeError {
    match &reason {
        SkipReason::MissingLoraBinding => BridgeError::NotOurConcern(format!("{reason:?}")),
        SkipReason::MalformedMetadata | SkipReason::MissingField(_) => {
            BridgeError::MalformedInput(format!("{reason:?}"))
        }
    }
}
