//! # Event Consumer
//!
//! Durable, ordered, at-least-once reader of the event log stream: a single
//! cooperative polling loop that reads a batch, decodes and applies each
//! record, and only acknowledges after a successful application, leaving
//! failures unacked so the broker redelivers them.
//!
//! The loop is intentionally never fanned out across records: strict serial
//! application is what preserves per-key ordering.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::decoder::{decode, DecodeOutcome, RawEventRecord, SkipReason};
use crate::error::BridgeError;
use crate::metrics::{Metrics, Outcome};
use crate::service::Service;

/// Maximum number of unacknowledged records read per batch.
const BATCH_SIZE: usize = 100;
/// How long a single `XREADGROUP` blocks waiting for new records.
const BLOCK_MILLIS: usize = 5_000;
/// Backoff after a `Transient` application failure before retrying the batch.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Reads the event log stream and applies decoded events to a [`Service`].
pub struct EventConsumer {
    conn: ConnectionManager,
    stream: String,
    group: String,
    consumer: String,
    service: Service,
    metrics: std::sync::Arc<dyn Metrics>,
}

impl EventConsumer {
    pub fn new(
        conn: ConnectionManager,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
        service: Service,
        metrics: std::sync::Arc<dyn Metrics>,
    ) -> Self {
        Self {
            conn,
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
            service,
            metrics,
        }
    }

    /// Ensure the consumer group exists at the stream's current tail.
    /// An already-existing group (`BUSYGROUP`) is not an error.
    async fn ensure_group(&self) -> Result<(), BridgeError> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(self.stream.as_str(), self.group.as_str(), "$")
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(BridgeError::transient("ensure_consumer_group", e)),
        }
    }

    /// Run the consumer loop until `cancel` fires. Returns `Ok(())` on clean
    /// cancellation, `Err` only for startup failures the caller should treat
    /// as fatal to the whole process.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BridgeError> {
        self.ensure_group().await?;

        loop {
            if cancel.is_cancelled() {
                info!("event consumer cancelled, exiting cleanly");
                return Ok(());
            }

            let batch = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("event consumer cancelled while waiting for records");
                    return Ok(());
                }
                batch = self.read_batch() => batch,
            };

            let records = match batch {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "event log read failed, backing off");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };

            for (id, record) in records {
                if cancel.is_cancelled() {
                    info!("event consumer cancelled mid-batch, leaving record unacked");
                    return Ok(());
                }

                match self.handle_record(&record).await {
                    Ok(()) => {
                        if let Err(e) = self.ack(&id).await {
                            warn!(error = %e, record_id = %id, "failed to acknowledge record");
                        }
                    }
                    Err(e) if e.is_terminal() => {
                        // Non-retryable rejection: the upstream event is
                        // already committed, retrying cannot fix it.
                        warn!(error = %e, record_id = %id, "skipping unprocessable record");
                        if let Err(e) = self.ack(&id).await {
                            warn!(error = %e, record_id = %id, "failed to acknowledge skipped record");
                        }
                    }
                    Err(e) => {
                        // Transient: leave unacked, back off, redeliver.
                        error!(error = %e, record_id = %id, "transient failure applying event, will retry");
                        tokio::time::sleep(RETRY_BACKOFF).await;
                        break;
                    }
                }
            }
        }
    }

    async fn read_batch(&self) -> Result<Vec<(String, RawEventRecord)>, BridgeError> {
        let mut conn = self.conn.clone();
        let opts = StreamReadOptions::default()
            .group(self.group.as_str(), self.consumer.as_str())
            .count(BATCH_SIZE)
            .block(BLOCK_MILLIS);

        let reply: StreamReadReply = conn
            .xread_options(&[self.stream.as_str()], &[">"], &opts)
            .await
            .map_err(|e| BridgeError::transient("xreadgroup", e))?;

        let mut out = Vec::new();
        for stream_key in reply.keys {
            for stream_id in stream_key.ids {
                let record: RawEventRecord = stream_id
                    .map
                    .iter()
                    .filter_map(|(k, v)| {
                        redis::from_redis_value::<String>(v)
                            .ok()
                            .map(|s| (k.clone(), s))
                    })
                    .collect();
                out.push((stream_id.id, record));
            }
        }
        Ok(out)
    }

    async fn ack(&self, id: &str) -> Result<(), BridgeError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(self.stream.as_str(), self.group.as_str(), &[id])
            .await
            .map_err(|e| BridgeError::transient("xack", e))?;
        Ok(())
    }

    async fn handle_record(&self, record: &RawEventRecord) -> Result<(), BridgeError> {
        let outcome = decode(record)?;
        match outcome {
            DecodeOutcome::Skipped(SkipReason::MissingLoraBinding) => {
                debug!("record is not LoRa-bound, skipping");
                Ok(())
            }
            DecodeOutcome::Skipped(reason) => {
                warn!(?reason, "dropping unprocessable record");
                Ok(())
            }
            DecodeOutcome::Decoded(event) => {
                let op = event.operation_name();
                let started = std::time::Instant::now();
                let result = self.service.apply_event(event).await;
                self.metrics.record(op, outcome_of(&result), started.elapsed());
                result
            }
        }
    }
}

fn outcome_of(result: &Result<(), BridgeError>) -> Outcome {
    match result {
        Ok(()) => Outcome::Ok,
        Err(BridgeError::Transient { .. }) => Outcome::Transient,
        Err(BridgeError::NotProvisioned(_)) => Outcome::NotProvisioned,
        Err(BridgeError::NotAuthorized(_)) => Outcome::NotAuthorized,
        Err(BridgeError::MalformedInput(_)) => Outcome::MalformedInput,
        Err(BridgeError::NotOurConcern(_)) => Outcome::NotOurConcern,
        Err(BridgeError::Fatal(_)) => Outcome::Transient,
    }
}
