//! End-to-end scenarios exercising `Service` against in-memory collaborators.
//! These drive the domain logic directly rather than the MQTT/event-log
//! adapters, against an in-memory route-map store instead of a real backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lora_bridge::error::BridgeError;
use lora_bridge::ingress::Uplink;
use lora_bridge::metrics::{CountingMetrics, Outcome};
use lora_bridge::publisher::{OutboundMessage, Publisher};
use lora_bridge::route_map::memory::InMemoryRouteMapStore;
use lora_bridge::route_map::{RouteMapStore, StoreError};
use lora_bridge::service::Service;

#[derive(Default)]
struct RecordingPublisher {
    sent: Mutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), BridgeError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Wraps a real store, failing the first `n` calls transiently before
/// delegating. Used for the "transient store failure then redelivery"
/// scenario.
struct FlakyStore<S> {
    inner: S,
    remaining_failures: AtomicUsize,
}

impl<S> FlakyStore<S> {
    fn new(inner: S, fail_n_times: usize) -> Self {
        Self { inner, remaining_failures: AtomicUsize::new(fail_n_times) }
    }

    fn maybe_fail(&self) -> Result<(), StoreError> {
        if self.remaining_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Transient(anyhow::anyhow!("injected failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: RouteMapStore> RouteMapStore for FlakyStore<S> {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.maybe_fail()?;
        self.inner.save(key, value).await
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.maybe_fail()?;
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.maybe_fail()?;
        self.inner.remove(key).await
    }
}

fn uplink(app_id: &str, dev_eui: &str, payload: &[u8]) -> Uplink {
    Uplink { app_id: app_id.to_string(), dev_eui: dev_eui.to_string(), payload: payload.to_vec() }
}

struct Harness {
    service: Service,
    publisher: Arc<RecordingPublisher>,
    metrics: Arc<CountingMetrics>,
}

fn harness() -> Harness {
    let publisher = Arc::new(RecordingPublisher::default());
    let metrics = Arc::new(CountingMetrics::new());
    let service = Service::new(
        Arc::new(InMemoryRouteMapStore::new()),
        Arc::new(InMemoryRouteMapStore::new()),
        Arc::new(InMemoryRouteMapStore::new()),
        publisher.clone(),
        metrics.clone(),
    );
    Harness { service, publisher, metrics }
}

#[tokio::test]
async fn scenario_1_provision_then_publish() {
    let h = harness();
    h.service.create_or_update_channel("chanA".into(), "app1".into()).await.unwrap();
    h.service.create_or_update_thing("thA".into(), "eui1".into()).await.unwrap();
    h.service.connect_thing("chanA".into(), "thA".into()).await.unwrap();

    h.service.publish(uplink("app1", "eui1", b"hello")).await.unwrap();

    let sent = h.publisher.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chan_id, "chanA");
    assert_eq!(sent[0].thing_id, "thA");
    assert_eq!(sent[0].payload, b"hello");
}

#[tokio::test]
async fn scenario_2_orphan_uplink_is_not_provisioned() {
    let h = harness();
    let err = h.service.publish(uplink("app1", "eui1", b"hello")).await.unwrap_err();
    assert!(matches!(err, BridgeError::NotProvisioned(_)));
    assert!(h.publisher.sent.lock().unwrap().is_empty());
    assert_eq!(h.metrics.count("publish", Outcome::NotProvisioned), 1);
}

#[tokio::test]
async fn scenario_3_late_provisioning_then_redelivery_succeeds() {
    let h = harness();
    assert!(h.service.publish(uplink("app1", "eui1", b"hello")).await.is_err());

    h.service.create_or_update_channel("chanA".into(), "app1".into()).await.unwrap();
    h.service.create_or_update_thing("thA".into(), "eui1".into()).await.unwrap();
    h.service.connect_thing("chanA".into(), "thA".into()).await.unwrap();

    h.service.publish(uplink("app1", "eui1", b"hello")).await.unwrap();
    assert_eq!(h.publisher.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn scenario_4_disconnect_blocks_publish() {
    let h = harness();
    h.service.create_or_update_channel("chanA".into(), "app1".into()).await.unwrap();
    h.service.create_or_update_thing("thA".into(), "eui1".into()).await.unwrap();
    h.service.connect_thing("chanA".into(), "thA".into()).await.unwrap();
    h.service.disconnect_thing("chanA".into(), "thA".into()).await.unwrap();

    let err = h.service.publish(uplink("app1", "eui1", b"hello")).await.unwrap_err();
    assert!(matches!(err, BridgeError::NotAuthorized(_)));
    assert!(h.publisher.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn scenario_5_non_lora_event_leaves_no_state() {
    use lora_bridge::events::decoder::{decode, DecodeOutcome, SkipReason};

    let record = [
        ("operation".to_string(), "thing.create".to_string()),
        ("id".to_string(), "thB".to_string()),
        ("metadata".to_string(), r#"{"other":{"k":"v"}}"#.to_string()),
    ]
    .into_iter()
    .collect();

    // The decoder recognizes this as a non-LoRa-bound event before any
    // mutator is ever invoked — the EventConsumer acks it without touching
    // the route maps.
    let outcome = decode(&record).unwrap();
    assert_eq!(outcome, DecodeOutcome::Skipped(SkipReason::MissingLoraBinding));

    // Publishing against the id this event would have named still resolves
    // as unprovisioned, confirming no binding was ever created for it.
    let h = harness();
    let err = h.service.publish(uplink("app-for-thB", "thB", b"x")).await.unwrap_err();
    assert!(matches!(err, BridgeError::NotProvisioned(_)));
}

#[tokio::test]
async fn scenario_6_transient_store_failure_then_redelivery_succeeds() {
    let publisher = Arc::new(RecordingPublisher::default());
    let flaky_thing_map = Arc::new(FlakyStore::new(InMemoryRouteMapStore::new(), 1));
    let service = Service::new(
        flaky_thing_map.clone(),
        Arc::new(InMemoryRouteMapStore::new()),
        Arc::new(InMemoryRouteMapStore::new()),
        publisher,
        Arc::new(CountingMetrics::new()),
    );

    // First attempt: injected transient failure, as if the consumer had not
    // yet acknowledged this record.
    let first = service.create_or_update_thing("thA".into(), "eui1".into()).await;
    assert!(matches!(first, Err(BridgeError::Transient { .. })));

    // Redelivery: the same mutation succeeds.
    service.create_or_update_thing("thA".into(), "eui1".into()).await.unwrap();

    assert_eq!(flaky_thing_map.get("thA").await.unwrap(), "eui1");
}
