//! Bridge status reporting.

use rumqttc::{LastWill, QoS};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::MessagePublisher;

/// Status value of a running bridge.
pub const STATUS_ONLINE: &str = "online";

/// Status value of a stopped or disconnected bridge.
pub const STATUS_OFFLINE: &str = "offline";

/// Bridge status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name (e.g., "modbus").
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("online", "offline").
    pub status: String,
    /// RFC 3339 time at which the status was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    /// Additional metadata (protocol-specific).
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    /// Create a new status with "online" state.
    pub fn online(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: STATUS_ONLINE.to_string(),
            since: Some(chrono::Utc::now().to_rfc3339()),
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a status with "offline" state.
    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: STATUS_OFFLINE.to_string(),
            since: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Publish this status, retained, to the given topic.
    pub fn publish(&self, publisher: &impl MessagePublisher, topic: &str) -> Result<()> {
        publisher.publish_json(topic, self, true)
    }

    /// Build an MQTT last will carrying this status, retained, on the given topic.
    pub fn last_will(&self, topic: &str) -> Result<LastWill> {
        let payload = serde_json::to_vec(self)?;
        Ok(LastWill::new(topic, payload, QoS::AtLeastOnce, true))
    }
}

/// Helper to publish bridge status on startup and shutdown.
pub struct StatusPublisher<P: MessagePublisher> {
    publisher: P,
    topic: String,
    bridge_name: String,
    version: String,
}

impl<P: MessagePublisher> StatusPublisher<P> {
    /// Create a new status publisher.
    pub fn new(
        publisher: P,
        topic: impl Into<String>,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            bridge_name: bridge_name.into(),
            version: version.into(),
        }
    }

    /// Topic the status is published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish "online" status with optional metadata.
    pub fn publish_online(&self, metadata: Option<serde_json::Value>) -> Result<()> {
        let mut status = BridgeStatus::online(&self.bridge_name, &self.version);
        if let Some(meta) = metadata {
            status = status.with_metadata(meta);
        }
        status.publish(&self.publisher, &self.topic)
    }

    /// Publish "offline" status.
    pub fn publish_offline(&self) -> Result<()> {
        BridgeStatus::offline(&self.bridge_name, &self.version)
            .publish(&self.publisher, &self.topic)
    }
}
