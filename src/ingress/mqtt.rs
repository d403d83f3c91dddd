//! MQTT client loop bridging LoRa uplinks into `Service::publish`, using
//! manual acknowledgement: a message is only acked once `Publish` returns
//! success or a non-transient rejection, so a transient failure leaves it
//! for the broker to redeliver.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{parse_uplink, topic_matches};
use crate::config::Config;
use crate::error::BridgeError;
use crate::service::Service;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Subscribes to the configured LoRa uplink topic and drives every message
/// through `Service::publish`.
pub struct MqttIngress {
    config: Config,
    service: Service,
}

impl MqttIngress {
    pub fn new(config: Config, service: Service) -> Self {
        Self { config, service }
    }

    /// Run the ingress loop until `cancel` fires, reconnecting on broker
    /// disconnects (not treated as fatal).
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BridgeError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self.connect_and_run(&cancel).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "mqtt session ended, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    async fn connect_and_run(&self, cancel: &CancellationToken) -> Result<(), BridgeError> {
        let (host, port) = split_host_port(&self.config.mqtt_url)?;
        let client_id = format!("lora-bridge-{}", uuid_like_suffix());

        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(self.config.mqtt_timeout);
        opts.set_manual_acks(true);
        // A transient publish failure tears this session down so `run` can
        // reconnect (below). With a clean session the broker would drop the
        // unacked in-flight PUBLISH the moment the stable client id
        // reconnects, losing exactly the uplink that needs redelivery.
        opts.set_clean_session(false);
        if let (Some(user), Some(pass)) = (&self.config.mqtt_user, &self.config.mqtt_pass) {
            opts.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(opts, 64);
        client
            .subscribe(&self.config.mqtt_topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| BridgeError::transient("mqtt_subscribe", e))?;
        info!(topic = %self.config.mqtt_topic, "subscribed to LoRa uplink topic");

        loop {
            let notification = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("mqtt ingress cancelled, exiting cleanly");
                    return Ok(());
                }
                result = eventloop.poll() => result,
            };

            let event = notification.map_err(|e| BridgeError::transient("mqtt_poll", e))?;
            if let Event::Incoming(Incoming::Publish(publish)) = event {
                if !topic_matches(&publish.topic, &self.config.mqtt_topic) {
                    continue;
                }
                self.handle_publish(&client, &publish).await?;
            }
        }
    }

    async fn handle_publish(
        &self,
        client: &AsyncClient,
        publish: &rumqttc::Publish,
    ) -> Result<(), BridgeError> {
        let uplink = match parse_uplink(&publish.payload) {
            Ok(uplink) => uplink,
            Err(e) => {
                warn!(error = %e, topic = %publish.topic, "discarding malformed uplink");
                ack(client, publish).await;
                return Ok(());
            }
        };

        match self.service.publish(uplink).await {
            Ok(()) => {
                ack(client, publish).await;
                Ok(())
            }
            Err(e @ BridgeError::NotProvisioned(_)) | Err(e @ BridgeError::NotAuthorized(_)) => {
                info!(error = %e, "uplink not routable, discarding");
                ack(client, publish).await;
                Ok(())
            }
            Err(e) if e.is_terminal() => {
                warn!(error = %e, "discarding unprocessable uplink");
                ack(client, publish).await;
                Ok(())
            }
            Err(e) => {
                // Transient: leave un-acked so the broker redelivers.
                Err(e)
            }
        }
    }
}

async fn ack(client: &AsyncClient, publish: &rumqttc::Publish) {
    if let Err(e) = client.ack(publish).await {
        warn!(error = %e, "failed to acknowledge mqtt publish");
    }
}

fn split_host_port(url: &str) -> Result<(String, u16), BridgeError> {
    let stripped = url
        .trim_start_matches("mqtts://")
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://")
        .trim_start_matches("ssl://");
    match stripped.split_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| BridgeError::Fatal(format!("invalid mqtt port in {url}")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((stripped.to_string(), 1883)),
    }
}

fn uuid_like_suffix() -> String {
    std::process::id().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port_from_tcp_url() {
        assert_eq!(
            split_host_port("tcp://localhost:1883").unwrap(),
            ("localhost".to_string(), 1883)
        );
    }

    #[test]
    fn defaults_to_1883_without_explicit_port() {
        assert_eq!(
            split_host_port("tcp://localhost").unwrap(),
            ("localhost".to_string(), 1883)
        );
    }
}
