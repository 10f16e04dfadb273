//! Modbus device polling and state publishing.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use hasslink_bridge_framework::{MessagePublisher, Result, TopicBuilder};

use crate::config::{DeviceConfig, ModbusBridgeConfig, RegisterClass, ValueType};
use crate::decoder::{RegisterValue, decode};
use crate::discovery::DiscoveryPublisher;
use crate::source::RegisterSource;

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Devices whose data points were processed
    pub devices_polled: usize,
    /// Devices skipped because their presence coil was not set
    pub devices_skipped: usize,
    /// Discovery payloads sent
    pub discovery_published: usize,
    /// State values sent
    pub values_published: usize,
    /// Data points that produced no value
    pub read_failures: usize,
}

/// Polls all configured devices over one register source.
///
/// Devices and data points are processed sequentially in configuration
/// order. A cycle never fails: unreadable values are skipped and retried
/// on the next cycle.
pub struct ModbusPoller<S, P> {
    source: S,
    publisher: P,
    discovery: DiscoveryPublisher,
    devices: Vec<DeviceConfig>,
    interval: Duration,
}

impl<S, P> ModbusPoller<S, P>
where
    S: RegisterSource,
    P: MessagePublisher,
{
    /// Create a poller.
    pub fn new(
        source: S,
        publisher: P,
        discovery: DiscoveryPublisher,
        devices: Vec<DeviceConfig>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            publisher,
            discovery,
            devices,
            interval,
        }
    }

    /// Create a poller for every device of a bridge configuration.
    pub fn from_config(source: S, publisher: P, config: &ModbusBridgeConfig) -> Result<Self> {
        let topics = TopicBuilder::new(&config.mqtt.base_topic, &config.discovery.prefix)?;
        let discovery = DiscoveryPublisher::new(topics, &config.discovery);

        Ok(Self::new(
            source,
            publisher,
            discovery,
            config.devices.clone(),
            Duration::from_secs(config.poll_interval_secs),
        ))
    }

    /// Delay between two cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one pass over all devices.
    pub async fn poll_cycle(&mut self) -> CycleStats {
        let mut stats = CycleStats::default();

        for device in &self.devices {
            if let Some(coil) = device.presence_coil {
                let present =
                    decode(&mut self.source, coil, ValueType::Bool, RegisterClass::Holding)
                        .await
                        .is_some_and(|value| value == RegisterValue::Bool(true));

                // An unreadable presence coil counts as absent.
                if !present {
                    debug!(
                        "Device '{}': presence coil {} not set, skipping",
                        device.name, coil
                    );
                    stats.devices_skipped += 1;
                    continue;
                }
            }

            stats.devices_polled += 1;

            for dp in &device.datapoints {
                // Announced even when the read below fails.
                self.discovery.publish(&self.publisher, &device.name, dp);
                stats.discovery_published += 1;

                let Some(value) =
                    decode(&mut self.source, dp.address, dp.value_type, dp.register_class).await
                else {
                    stats.read_failures += 1;
                    continue;
                };

                let state = format_state(scale_value(value.as_f64(), dp.scaling));
                let topic = self.discovery.topics().state_topic(&device.name, &dp.name);

                match self.publisher.publish(&topic, state.clone().into_bytes(), false) {
                    Ok(()) => {
                        debug!("Published {} = {}", topic, state);
                        stats.values_published += 1;
                    }
                    Err(e) => warn!(topic = %topic, error = %e, "Failed to publish state"),
                }
            }
        }

        stats
    }

    /// Poll until `shutdown` becomes `true`.
    ///
    /// Shutdown is checked between cycles; a cycle in progress always
    /// completes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting Modbus poller for {} device(s) (interval: {}s)",
            self.devices.len(),
            self.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let stats = self.poll_cycle().await;

            info!(
                polled = stats.devices_polled,
                skipped = stats.devices_skipped,
                values = stats.values_published,
                failures = stats.read_failures,
                "Poll cycle finished at {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown channel closed");
                        break;
                    }
                }
            }
        }

        info!("Modbus poller stopped");
    }
}

/// Apply the scaling factor. Rounding happens in [`format_state`].
pub fn scale_value(raw: f64, scaling: f64) -> f64 {
    raw * scaling
}

/// Text payload of a state message.
///
/// Rounds the exact value to one decimal, ties to even. Negative values that
/// round to zero are published as `0.0`.
pub fn format_state(value: f64) -> String {
    let text = format!("{:.1}", value);
    if text == "-0.0" {
        "0.0".to_string()
    } else {
        text
    }
}
