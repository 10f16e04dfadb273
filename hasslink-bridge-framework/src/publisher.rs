//! Message publishing to MQTT.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS,
};
use serde::Serialize;
use tokio::task::JoinHandle;

use hasslink_common::MqttConfig;

use crate::error::{BridgeError, Result};

/// Capacity of the request queue between the client handle and the event loop.
const REQUEST_QUEUE_CAPACITY: usize = 256;

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Capability to publish messages on the bus.
///
/// Implementations queue the message and return immediately; delivery
/// happens in the background and is never awaited by the caller.
pub trait MessagePublisher: Send + Sync {
    /// Publish a raw payload to a topic.
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()>;

    /// Publish a value serialized as JSON.
    fn publish_json<T: Serialize>(&self, topic: &str, value: &T, retain: bool) -> Result<()>
    where
        Self: Sized,
    {
        let payload = serde_json::to_vec(value)?;
        self.publish(topic, payload, retain)
    }
}

/// Publisher backed by an MQTT broker connection.
///
/// Cloning is cheap: all clones share the same client and event loop.
#[derive(Clone, Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Create the MQTT client and spawn its event loop.
    ///
    /// The connection is established by the event loop task, which keeps
    /// reconnecting until [`disconnect`](Self::disconnect) is called.
    pub fn connect(
        config: &MqttConfig,
        last_will: Option<LastWill>,
    ) -> Result<(Self, JoinHandle<()>)> {
        if config.host.is_empty() {
            return Err(BridgeError::MqttConnection(
                "broker host cannot be empty".to_string(),
            ));
        }

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        if let Some(will) = last_will {
            options.set_last_will(will);
        }

        tracing::info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            "Connecting to MQTT broker"
        );

        let (client, eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        let handle = tokio::spawn(drive_event_loop(eventloop));

        Ok((Self { client }, handle))
    }

    /// Send a DISCONNECT to the broker, ending the event loop once queued messages are out.
    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BridgeError::MqttConnection(e.to_string()))
    }
}

impl MessagePublisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, retain, payload)
            .map_err(|e| BridgeError::publish(topic, e))
    }
}

/// Poll the MQTT event loop until the client disconnects.
async fn drive_event_loop(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "Connected to MQTT broker");
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::warn!("Broker closed the MQTT connection");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT client disconnected");
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                tracing::debug!("All MQTT client handles dropped");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
