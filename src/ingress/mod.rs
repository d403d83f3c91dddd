//! # MQTT Ingress
//!
//! Parses LoRa network server uplink payloads and drives the topic pattern
//! matching shared between the default and legacy subscriptions.

pub mod mqtt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::error::BridgeError;

/// A parsed LoRa uplink, ready for `Service::publish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uplink {
    pub app_id: String,
    pub dev_eui: String,
    pub payload: Vec<u8>,
}

/// Raw JSON shape of an uplink payload. The LoRa network server and its
/// older releases disagree on casing, so both forms are accepted.
#[derive(Deserialize)]
struct RawUplink {
    #[serde(rename = "applicationID")]
    application_id_pascal: Option<String>,
    #[serde(rename = "application_id")]
    application_id_snake: Option<String>,
    #[serde(rename = "devEUI")]
    dev_eui_camel: Option<String>,
    #[serde(rename = "dev_eui")]
    dev_eui_snake: Option<String>,
    data: Option<String>,
}

/// Parse an uplink payload. Malformed JSON or a missing required field is
/// [`BridgeError::MalformedInput`]: the caller logs and discards it rather
/// than retrying.
pub fn parse_uplink(bytes: &[u8]) -> Result<Uplink, BridgeError> {
    let raw: RawUplink = serde_json::from_slice(bytes)
        .map_err(|e| BridgeError::MalformedInput(format!("invalid uplink JSON: {e}")))?;

    let app_id = raw
        .application_id_pascal
        .or(raw.application_id_snake)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BridgeError::MalformedInput("missing applicationID".to_string()))?;

    let dev_eui = raw
        .dev_eui_camel
        .or(raw.dev_eui_snake)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BridgeError::MalformedInput("missing devEUI".to_string()))?;

    let data = raw
        .data
        .ok_or_else(|| BridgeError::MalformedInput("missing data".to_string()))?;
    let payload = BASE64
        .decode(data)
        .map_err(|e| BridgeError::MalformedInput(format!("invalid base64 payload: {e}")))?;

    Ok(Uplink { app_id, dev_eui, payload })
}

/// Does `topic` match the LoRa uplink pattern `application/+/device/+/event/up`
/// (or, when `legacy` is set, `application/+/device/+/rx`)? `+` matches one
/// topic segment.
pub fn topic_matches(topic: &str, pattern: &str) -> bool {
    let topic_parts = topic.split('/');
    let pattern_parts = pattern.split('/');
    if topic.split('/').count() != pattern.split('/').count() {
        return false;
    }
    topic_parts
        .zip(pattern_parts)
        .all(|(t, p)| p == "+" || t == p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uplink_with_pascal_case_fields() {
        let body = br#"{"applicationID":"app1","devEUI":"eui1","data":"aGVsbG8="}"#;
        let uplink = parse_uplink(body).unwrap();
        assert_eq!(uplink.app_id, "app1");
        assert_eq!(uplink.dev_eui, "eui1");
        assert_eq!(uplink.payload, b"hello");
    }

    #[test]
    fn parses_uplink_with_snake_case_fields() {
        let body = br#"{"application_id":"app1","dev_eui":"eui1","data":"aGVsbG8="}"#;
        let uplink = parse_uplink(body).unwrap();
        assert_eq!(uplink.app_id, "app1");
        assert_eq!(uplink.dev_eui, "eui1");
    }

    #[test]
    fn missing_dev_eui_is_malformed() {
        let body = br#"{"applicationID":"app1","data":"aGVsbG8="}"#;
        assert!(matches!(parse_uplink(body), Err(BridgeError::MalformedInput(_))));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(parse_uplink(b"not json"), Err(BridgeError::MalformedInput(_))));
    }

    #[test]
    fn topic_matching_honors_wildcards() {
        assert!(topic_matches(
            "application/17/device/abcd/event/up",
            "application/+/device/+/event/up"
        ));
        assert!(topic_matches(
            "application/17/device/abcd/rx",
            "application/+/device/+/rx"
        ));
        assert!(!topic_matches(
            "application/17/device/abcd/event/up",
            "application/+/device/+/rx"
        ));
    }
}
