use std::process::ExitCode;
use std::sync::Arc;

use lora_bridge::config::Config;
use lora_bridge::events::consumer::EventConsumer;
use lora_bridge::ingress::mqtt::MqttIngress;
use lora_bridge::logging::init_logger;
use lora_bridge::metrics::NoopMetrics;
use lora_bridge::publisher::nats::NatsPublisher;
use lora_bridge::route_map::redis_store::RedisRouteMapStore;
use lora_bridge::service::{prefix, Service};
use lora_bridge::supervisor::Supervisor;
use lora_bridge::BridgeError;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    init_logger(&config.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bridge exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), BridgeError> {
    let route_map_url = config.route_map_redis_url();
    let thing_map = RedisRouteMapStore::connect(&route_map_url, prefix::THING)
        .await
        .map_err(|e| BridgeError::Fatal(format!("route map store (thing): {e}")))?;
    let channel_map = RedisRouteMapStore::connect(&route_map_url, prefix::CHANNEL)
        .await
        .map_err(|e| BridgeError::Fatal(format!("route map store (channel): {e}")))?;
    let connection_map = RedisRouteMapStore::connect(&route_map_url, prefix::CONNECTION)
        .await
        .map_err(|e| BridgeError::Fatal(format!("route map store (connection): {e}")))?;

    let publisher = NatsPublisher::connect(&config.bus_url)
        .await
        .map_err(|e| BridgeError::Fatal(format!("internal bus: {e}")))?;

    let service = Service::new(
        Arc::new(thing_map),
        Arc::new(channel_map),
        Arc::new(connection_map),
        Arc::new(publisher),
        Arc::new(NoopMetrics),
    );

    let event_log_client = redis::Client::open(config.event_log_redis_url().as_str())
        .map_err(|e| BridgeError::Fatal(format!("event log: {e}")))?;
    let event_log_conn = redis::aio::ConnectionManager::new(event_log_client)
        .await
        .map_err(|e| BridgeError::Fatal(format!("event log: {e}")))?;

    let event_consumer = EventConsumer::new(
        event_log_conn,
        config.event_stream_name(),
        config.event_group_name(),
        config.event_consumer_name.clone(),
        service.clone(),
        Arc::new(NoopMetrics),
    );

    let mqtt_ingress = MqttIngress::new(config.clone(), service.clone());

    let supervisor = Supervisor::new();
    let cancel = supervisor.cancellation_token();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel.cancel();
    });

    supervisor.run(event_consumer, mqtt_ingress, config.http_port).await
}
