//! # Bridge Logging
//!
//! Initializes `tracing` with an `EnvFilter` seeded from the `LOG_LEVEL`
//! configuration variable. The bridge is a long-running service whose
//! event-consumer and MQTT-ingress loops benefit from span-scoped,
//! structured fields (event key, device EUI) rather than interpolated
//! strings, so `tracing` is used throughout rather than plain `log`.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber.
///
/// `level` is used only when `RUST_LOG` is unset; `RUST_LOG` always wins so
/// operators can override verbosity per-module without a redeploy.
pub fn init_logger(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
