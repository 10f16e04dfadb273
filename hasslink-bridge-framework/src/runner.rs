//! Bridge runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use hasslink_common::{LoggingConfig, TopicBuilder, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::MqttPublisher;
use crate::status::{BridgeStatus, StatusPublisher};

/// Time granted to workers to finish their current cycle after shutdown.
const WORKER_GRACE: Duration = Duration::from_secs(5);

/// Time granted to the MQTT event loop to flush queued messages.
const FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Bridge runner that manages the lifecycle of a protocol bridge.
///
/// Handles:
/// - Logging initialization
/// - MQTT connection (with an "offline" last will)
/// - Task spawning and shutdown signalling
/// - Graceful shutdown on Ctrl+C or SIGTERM
/// - Status publishing
///
/// # Example
///
/// ```ignore
/// use hasslink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
///
///     let publisher = runner.publisher();
///     let shutdown = runner.shutdown_signal();
///     runner.spawn(async move {
///         // Worker logic here, stopping when `shutdown` flips to true
///     });
///
///     runner.run_with_metadata(None).await
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging and status.
    name: String,
    /// The loaded configuration.
    config: C,
    /// MQTT publisher shared with workers.
    publisher: MqttPublisher,
    /// MQTT event loop task.
    event_loop: JoinHandle<()>,
    /// Status publisher.
    status_publisher: StatusPublisher<MqttPublisher>,
    /// Shutdown flag broadcast to workers.
    shutdown_tx: watch::Sender<bool>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner with CLI args for log level override.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Create the MQTT client with an "offline" last will on the status topic
    /// 3. Create the status publisher
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let mut log_config: LoggingConfig = config.logging().clone();
        if let Some(level) = args.and_then(|a| a.log_level.as_ref()) {
            log_config.level = level.clone();
        }

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let status_topic =
            TopicBuilder::with_default_prefix(&config.mqtt().base_topic)?.status_topic();
        let last_will = BridgeStatus::offline(&name, &version).last_will(&status_topic)?;

        let (publisher, event_loop) = MqttPublisher::connect(config.mqtt(), Some(last_will))?;

        let status_publisher =
            StatusPublisher::new(publisher.clone(), status_topic, name.clone(), version);

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            name,
            config,
            publisher,
            event_loop,
            status_publisher,
            shutdown_tx,
            tasks: Vec::new(),
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> MqttPublisher {
        self.publisher.clone()
    }

    /// Get a receiver that flips to `true` when the bridge shuts down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a worker task.
    ///
    /// Workers should watch [`shutdown_signal`](Self::shutdown_signal) and return
    /// once it is set; stragglers are aborted after a grace period.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C or SIGTERM is received.
    ///
    /// This will:
    /// 1. Publish "online" status
    /// 2. Wait for Ctrl+C or SIGTERM
    /// 3. Signal shutdown and wait for workers to finish their cycle
    /// 4. Publish "offline" status
    /// 5. Disconnect from the broker
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        if let Err(e) = self.status_publisher.publish_online(metadata) {
            tracing::warn!(error = %e, "Failed to publish online status");
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            status_topic = %self.status_publisher.topic(),
            "Bridge running. Press Ctrl+C to stop."
        );

        wait_for_termination().await;

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        // No receiver left simply means every worker has already stopped.
        let _ = self.shutdown_tx.send(true);

        let mut tasks = self.tasks;
        let joined = tokio::time::timeout(WORKER_GRACE, async {
            for task in tasks.iter_mut() {
                let _ = task.await;
            }
        })
        .await;

        if joined.is_err() {
            tracing::warn!("Workers did not stop in time, aborting");
            for task in &tasks {
                task.abort();
            }
        }

        if let Err(e) = self.status_publisher.publish_offline() {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.publisher.disconnect().await {
            tracing::warn!(error = %e, "Error disconnecting from MQTT broker");
        }

        let mut event_loop = self.event_loop;
        if tokio::time::timeout(FLUSH_GRACE, &mut event_loop).await.is_err() {
            event_loop.abort();
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Wait for Ctrl+C, or SIGTERM on Unix.
async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                        }
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM");
                    }
                }
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
}

#[cfg(test)]
mod tests {
    // Runner tests require an MQTT broker and process signals.
    // The modbus bridge integration tests drive workers with a manual shutdown channel.
}
