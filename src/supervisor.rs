//! # Supervisor
//!
//! Starts the long-running loops as independent tasks linked to a single
//! cancellation scope. Any task exiting with an error cancels the scope;
//! shutdown is bounded by a fixed timeout so a stuck task cannot hang the
//! process.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::BridgeError;
use crate::events::consumer::EventConsumer;
use crate::health;
use crate::ingress::mqtt::MqttIngress;

/// Bound on graceful shutdown after cancellation is triggered.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the three long-running tasks (event consumer, MQTT ingress, health
/// endpoint) and the shared cancellation token that links them.
pub struct Supervisor {
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new() -> Self {
        Self { cancel: CancellationToken::new() }
    }

    /// Expose the shared cancellation token so callers (e.g. a signal
    /// handler in `main`) can trigger shutdown externally.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run all three tasks. Whichever finishes first (failure, or the token
    /// being cancelled externally) cancels the shared scope; the remaining
    /// two are then given up to [`SHUTDOWN_TIMEOUT`] to wind down before
    /// this returns.
    pub async fn run(
        &self,
        event_consumer: EventConsumer,
        mqtt_ingress: MqttIngress,
        health_port: u16,
    ) -> Result<(), BridgeError> {
        let event_consumer = Arc::new(event_consumer);
        let mqtt_ingress = Arc::new(mqtt_ingress);

        let consumer_cancel = self.cancel.clone();
        let consumer_task: JoinHandle<Result<(), BridgeError>> = tokio::spawn({
            let event_consumer = event_consumer.clone();
            async move { event_consumer.run(consumer_cancel).await }
        });

        let ingress_cancel = self.cancel.clone();
        let ingress_task: JoinHandle<Result<(), BridgeError>> = tokio::spawn({
            let mqtt_ingress = mqtt_ingress.clone();
            async move { mqtt_ingress.run(ingress_cancel).await }
        });

        let health_cancel = self.cancel.clone();
        let health_task: JoinHandle<Result<(), BridgeError>> =
            tokio::spawn(async move { health::serve(health_port, health_cancel).await });

        let cancel = self.cancel.clone();
        let (first, rest): (_, Vec<JoinHandle<Result<(), BridgeError>>>) = tokio::select! {
            result = consumer_task => (("event_consumer", result), vec![ingress_task, health_task]),
            result = ingress_task => (("mqtt_ingress", result), vec![consumer_task, health_task]),
            result = health_task => (("health", result), vec![consumer_task, ingress_task]),
        };
        cancel.cancel();
        let outcome = self.finish(first.0, first.1);

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all(rest)).await.is_err() {
            warn!("graceful shutdown exceeded {:?}", SHUTDOWN_TIMEOUT);
        }

        outcome
    }

    /// Translate the first task's outcome; only a genuine task error is
    /// propagated to the caller.
    fn finish(
        &self,
        name: &'static str,
        result: Result<Result<(), BridgeError>, tokio::task::JoinError>,
    ) -> Result<(), BridgeError> {
        match result {
            Ok(Ok(())) => {
                info!(task = name, "task exited cleanly");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(task = name, error = %e, "task failed, shutting down");
                Err(e)
            }
            Err(join_err) => {
                error!(task = name, error = %join_err, "task panicked, shutting down");
                Err(BridgeError::Fatal(format!("{name} panicked: {join_err}")))
            }
        }
    }

    /// Trigger cancellation from outside (e.g. a signal handler in `main`).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

async fn join_all(handles: Vec<JoinHandle<Result<(), BridgeError>>>) {
    for handle in handles {
        let _ = handle.await;
    }
}
