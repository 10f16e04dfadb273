//! Home Assistant MQTT discovery.
//!
//! Every data point is announced as a `sensor` entity on
//! `<prefix>/sensor/<device>_<datapoint>/config`. Payloads are retained and
//! republished every poll cycle so a restarted Home Assistant always picks
//! up the current metadata.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use hasslink_bridge_framework::{MessagePublisher, TopicBuilder};
use hasslink_common::{device_identifier, unique_id};

use crate::config::{DataPointConfig, DiscoveryConfig};

/// Discovery config payload for one data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    /// Display name, `"<device> <datapoint>"`
    pub name: String,
    /// Topic the value is published on
    pub state_topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    /// `"<device>_<datapoint>"`, not slugged
    pub unique_id: String,
    pub device: DeviceDescriptor,
}

/// Device block shared by all entities of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub identifiers: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// Builds and publishes discovery payloads.
#[derive(Debug, Clone)]
pub struct DiscoveryPublisher {
    topics: TopicBuilder,
    manufacturer: String,
    model: String,
}

impl DiscoveryPublisher {
    pub fn new(topics: TopicBuilder, config: &DiscoveryConfig) -> Self {
        Self {
            topics,
            manufacturer: config.manufacturer.clone(),
            model: config.model.clone(),
        }
    }

    /// Topic builder used for state and discovery topics.
    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Build the payload for a data point of `device`.
    pub fn payload(&self, device: &str, datapoint: &DataPointConfig) -> DiscoveryPayload {
        DiscoveryPayload {
            name: format!("{} {}", device, datapoint.name),
            state_topic: self.topics.state_topic(device, &datapoint.name),
            unit_of_measurement: datapoint.unit.clone(),
            unique_id: unique_id(device, &datapoint.name),
            device: DeviceDescriptor {
                identifiers: device_identifier(device),
                name: device.to_string(),
                manufacturer: self.manufacturer.clone(),
                model: self.model.clone(),
            },
        }
    }

    /// Publish the retained discovery payload for a data point.
    ///
    /// Failures are logged and never returned; the next cycle republishes.
    pub fn publish<P: MessagePublisher>(
        &self,
        publisher: &P,
        device: &str,
        datapoint: &DataPointConfig,
    ) {
        let topic = self.topics.discovery_topic(device, &datapoint.name);
        let payload = self.payload(device, datapoint);

        match publisher.publish_json(&topic, &payload, true) {
            Ok(()) => trace!(topic = %topic, "Published discovery config"),
            Err(e) => warn!(topic = %topic, error = %e, "Failed to publish discovery config"),
        }
    }
}
