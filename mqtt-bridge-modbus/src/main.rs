//! MQTT bridge for Modbus TCP devices.
//!
//! This bridge polls typed data points over Modbus TCP and publishes their
//! values to MQTT, along with Home Assistant discovery configs.

use anyhow::Result;
use hasslink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

use mqtt_bridge_modbus::config::ModbusBridgeConfig;
use mqtt_bridge_modbus::poller::ModbusPoller;
use mqtt_bridge_modbus::source::ModbusTcpSource;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = BridgeArgs::parse_with_default("modbus.json5");

    // Load and validate configuration
    let config = ModbusBridgeConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    // Initializes logging and the MQTT connection
    let mut runner = BridgeRunner::new_with_args("modbus", config, Some(&args))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let source = ModbusTcpSource::new(&runner.config().modbus);
    let poller = ModbusPoller::from_config(source, runner.publisher(), runner.config())
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(
        "Modbus bridge running (device: {}:{}, base topic: {}, {} device(s))",
        runner.config().modbus.host,
        runner.config().modbus.port,
        runner.config().mqtt.base_topic,
        runner.config().devices.len()
    );

    let shutdown = runner.shutdown_signal();
    runner.spawn(poller.run(shutdown));

    let metadata = serde_json::json!({
        "modbus": {
            "host": runner.config().modbus.host,
            "port": runner.config().modbus.port,
            "unit_id": runner.config().modbus.unit_id,
        },
        "devices": runner.config().devices.iter().map(|d| &d.name).collect::<Vec<_>>(),
        "poll_interval_secs": runner.config().poll_interval_secs,
    });

    // Run until Ctrl+C or SIGTERM
    runner
        .run_with_metadata(Some(metadata))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}
