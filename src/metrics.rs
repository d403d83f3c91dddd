//! # Operation Metrics Port
//!
//! The Prometheus counter/latency wrappers themselves are an external
//! collaborator — this module defines only the port `Service` calls on every
//! mutator and `Publish`, keyed by operation name (`create_thing`,
//! `update_thing`, `remove_thing`, `create_channel`, `update_channel`,
//! `remove_channel`, `connect_thing`, `disconnect_thing`, `publish`) crossed
//! with an outcome label.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Outcome label recorded alongside an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ok,
    Transient,
    NotProvisioned,
    NotAuthorized,
    MalformedInput,
    NotOurConcern,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Transient => "transient",
            Outcome::NotProvisioned => "not_provisioned",
            Outcome::NotAuthorized => "not_authorized",
            Outcome::MalformedInput => "malformed_input",
            Outcome::NotOurConcern => "not_our_concern",
        }
    }
}

/// Port through which `Service` reports operation outcomes. The real
/// Prometheus exporter implements this trait outside the core crate; this
/// crate ships a no-op default and an in-memory counter used by tests.
pub trait Metrics: Send + Sync {
    fn record(&self, operation: &'static str, outcome: Outcome, duration: Duration);
}

/// Default metrics sink: discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn record(&self, _operation: &'static str, _outcome: Outcome, _duration: Duration) {}
}

/// In-memory metrics sink, keyed by `(operation, outcome)`, used by tests and
/// as a reference implementation for the port.
#[derive(Default)]
pub struct CountingMetrics {
    counts: Mutex<HashMap<(&'static str, &'static str), u64>>,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, operation: &'static str, outcome: Outcome) -> u64 {
        let counts = self.counts.lock().unwrap();
        *counts.get(&(operation, outcome.as_str())).unwrap_or(&0)
    }
}

impl Metrics for CountingMetrics {
    fn record(&self, operation: &'static str, outcome: Outcome, _duration: Duration) {
        let mut counts = self.counts.lock().unwrap();
        *counts.entry((operation, outcome.as_str())).or_insert(0) += 1;
    }
}
