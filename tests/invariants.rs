//! Property tests for the idempotence and per-key ordering invariants of the
//! route maps, over sequences of mutator calls rather than encode/decode
//! pairs.

use std::sync::Arc;

use lora_bridge::error::BridgeError;
use lora_bridge::ingress::Uplink;
use lora_bridge::metrics::NoopMetrics;
use lora_bridge::publisher::{OutboundMessage, Publisher};
use lora_bridge::route_map::memory::InMemoryRouteMapStore;
use lora_bridge::service::Service;
use proptest::prelude::*;

struct DiscardingPublisher;

#[async_trait::async_trait]
impl Publisher for DiscardingPublisher {
    async fn publish(&self, _message: OutboundMessage) -> Result<(), BridgeError> {
        Ok(())
    }
}

fn service() -> Service {
    Service::new(
        Arc::new(InMemoryRouteMapStore::new()),
        Arc::new(InMemoryRouteMapStore::new()),
        Arc::new(InMemoryRouteMapStore::new()),
        Arc::new(DiscardingPublisher),
        Arc::new(NoopMetrics),
    )
}

fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    /// Idempotence: redelivering a `CreateThing` (the EventConsumer failing to ack
    /// right after a successful apply, then retrying the same record on
    /// restart) any number of extra times leaves the same final state as a
    /// single application.
    #[test]
    fn create_thing_is_idempotent_under_redelivery(extra_redeliveries in 0usize..6) {
        let runtime = rt();
        runtime.block_on(async {
            let svc = service();
            svc.create_or_update_thing("thingA".into(), "eui1".into()).await.unwrap();
            for _ in 0..extra_redeliveries {
                svc.create_or_update_thing("thingA".into(), "eui1".into()).await.unwrap();
            }
        });
    }

    /// Ordering: for events affecting the same connection key, only the last
    /// applied event's effect survives redelivery of that same (most
    /// recently applied) event — redelivery replays the record the consumer
    /// crashed before acking, never an older one it already moved past.
    /// Observed indirectly through `Publish`, since the connection map has
    /// no direct public query surface (only mutators are exposed).
    #[test]
    fn connect_disconnect_connect_converges_on_connected_under_redelivery(
        redeliveries_of_last_event in 0usize..4,
    ) {
        let runtime = rt();
        runtime.block_on(async {
            let svc = service();
            svc.create_or_update_channel("chanA".into(), "app1".into()).await.unwrap();
            svc.create_or_update_thing("thingA".into(), "eui1".into()).await.unwrap();

            // Canonical log order: connect, disconnect, connect.
            svc.connect_thing("chanA".into(), "thingA".into()).await.unwrap();
            svc.disconnect_thing("chanA".into(), "thingA".into()).await.unwrap();
            svc.connect_thing("chanA".into(), "thingA".into()).await.unwrap();

            // Redeliver the log's final event some extra number of times.
            for _ in 0..redeliveries_of_last_event {
                svc.connect_thing("chanA".into(), "thingA".into()).await.unwrap();
            }

            let uplink = Uplink {
                app_id: "app1".to_string(),
                dev_eui: "eui1".to_string(),
                payload: b"x".to_vec(),
            };
            prop_assert!(svc.publish(uplink).await.is_ok());
            Ok(())
        })?;
    }

    /// The disconnect half of the same property: redelivering a stale
    /// `DisconnectThing` after a newer `ConnectThing` already re-established
    /// the pair must not tear it down.
    #[test]
    fn stale_disconnect_redelivery_does_not_undo_newer_connect(
        redeliveries_of_stale_disconnect in 0usize..4,
    ) {
        let runtime = rt();
        runtime.block_on(async {
            let svc = service();
            svc.create_or_update_channel("chanA".into(), "app1".into()).await.unwrap();
            svc.create_or_update_thing("thingB".into(), "eui2".into()).await.unwrap();

            svc.connect_thing("chanA".into(), "thingA_now_gone".into()).await.unwrap();
            svc.disconnect_thing("chanA".into(), "thingA_now_gone".into()).await.unwrap();
            svc.connect_thing("chanA".into(), "thingB".into()).await.unwrap();

            // A crashed consumer might redeliver the disconnect it already
            // applied against the old pair; it must remain a no-op against
            // the newer connection.
            for _ in 0..redeliveries_of_stale_disconnect {
                svc.disconnect_thing("chanA".into(), "thingA_now_gone".into()).await.unwrap();
            }

            let uplink = Uplink {
                app_id: "app1".to_string(),
                dev_eui: "eui2".to_string(),
                payload: b"x".to_vec(),
            };
            prop_assert!(svc.publish(uplink).await.is_ok());
            Ok(())
        })?;
    }
}
