//! # Bridge Configuration
//!
//! Loads the environment-variable configuration surface for the bridge.
//! Every field has a sane default so the bridge can boot in a local/dev
//! environment with nothing set except broker/store URLs.

use std::env;
use std::time::Duration;

/// Default LoRa uplink topic pattern (the `.../event/up` form). The legacy
/// `.../rx` pattern is recognized for compatibility but is not the default.
pub const DEFAULT_MQTT_TOPIC: &str = "application/+/device/+/event/up";
pub const LEGACY_MQTT_TOPIC: &str = "application/+/device/+/rx";

/// Fully resolved bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,

    pub mqtt_url: String,
    pub mqtt_topic: String,
    pub mqtt_user: Option<String>,
    pub mqtt_pass: Option<String>,
    pub mqtt_timeout: Duration,

    pub bus_url: String,

    pub event_log_url: String,
    pub event_log_pass: Option<String>,
    pub event_log_db: i64,
    pub event_consumer_name: String,
    /// Namespace prefix for the event stream (`<platform>.things`) and its
    /// consumer group (`<platform>.lora`).
    pub platform_name: String,

    pub route_map_url: String,
    pub route_map_pass: Option<String>,
    pub route_map_db: i64,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 9004,
            mqtt_url: "tcp://localhost:1883".to_string(),
            mqtt_topic: DEFAULT_MQTT_TOPIC.to_string(),
            mqtt_user: None,
            mqtt_pass: None,
            mqtt_timeout: Duration::from_secs(30),
            bus_url: "nats://localhost:4222".to_string(),
            event_log_url: "localhost:6379".to_string(),
            event_log_pass: None,
            event_log_db: 0,
            event_consumer_name: "lora-bridge".to_string(),
            platform_name: "mainflux".to_string(),
            route_map_url: "localhost:6380".to_string(),
            route_map_pass: None,
            route_map_db: 0,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// [`Config::default`] for anything unset.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            http_port: env_parsed("HTTP_PORT", default.http_port),
            mqtt_url: env_or("MQTT_URL", default.mqtt_url),
            mqtt_topic: env_or("MQTT_TOPIC", default.mqtt_topic),
            mqtt_user: env::var("MQTT_USER").ok(),
            mqtt_pass: env::var("MQTT_PASS").ok(),
            mqtt_timeout: Duration::from_secs(env_parsed(
                "MQTT_TIMEOUT",
                default.mqtt_timeout.as_secs(),
            )),
            bus_url: env_or("BUS_URL", default.bus_url),
            event_log_url: env_or("EVENT_LOG_URL", default.event_log_url),
            event_log_pass: env::var("EVENT_LOG_PASS").ok(),
            event_log_db: env_parsed("EVENT_LOG_DB", default.event_log_db),
            event_consumer_name: env_or("EVENT_CONSUMER_NAME", default.event_consumer_name),
            platform_name: env_or("PLATFORM_NAME", default.platform_name),
            route_map_url: env_or("ROUTE_MAP_URL", default.route_map_url),
            route_map_pass: env::var("ROUTE_MAP_PASS").ok(),
            route_map_db: env_parsed("ROUTE_MAP_DB", default.route_map_db),
            log_level: env_or("LOG_LEVEL", default.log_level),
        }
    }

    /// Resolve the MQTT topic to subscribe to, recognizing the legacy `.../rx`
    /// pattern as equivalent to the newer `.../event/up` form. Both patterns
    /// exist across LoRa server revisions; default to the newer one, keep
    /// both configurable.
    pub fn is_legacy_topic(&self) -> bool {
        self.mqtt_topic == LEGACY_MQTT_TOPIC
    }

    /// Name of the event log stream, `<platform>.things`.
    pub fn event_stream_name(&self) -> String {
        format!("{}.things", self.platform_name)
    }

    /// Name of the event log consumer group, `<platform>.lora`.
    pub fn event_group_name(&self) -> String {
        format!("{}.lora", self.platform_name)
    }

    /// Build a `redis://[:<pass>@]<host>:<port>/<db>` connection URL for the
    /// event log, folding in `EVENT_LOG_PASS`/`EVENT_LOG_DB` which are kept
    /// as separate fields so they never end up logged alongside the bare
    /// host:port.
    pub fn event_log_redis_url(&self) -> String {
        redis_url(&self.event_log_url, self.event_log_pass.as_deref(), self.event_log_db)
    }

    /// Build a `redis://[:<pass>@]<host>:<port>/<db>` connection URL for the
    /// route-map store, folding in `ROUTE_MAP_PASS`/`ROUTE_MAP_DB`.
    pub fn route_map_redis_url(&self) -> String {
        redis_url(&self.route_map_url, self.route_map_pass.as_deref(), self.route_map_db)
    }
}

fn redis_url(host_port: &str, pass: Option<&str>, db: i64) -> String {
    let host_port = host_port
        .trim_start_matches("redis://")
        .trim_start_matches("rediss://");
    match pass {
        Some(pass) => format!("redis://:{pass}@{host_port}/{db}"),
        None => format!("redis://{host_port}/{db}"),
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
