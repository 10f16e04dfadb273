//! hasslink Bridge Framework
//!
//! Common abstractions for building bridges that publish device data to MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`MessagePublisher`], the publish capability, and [`MqttPublisher`] implementing it
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for retained online/offline status reporting
//!
//! # Example
//!
//! ```ignore
//! use hasslink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!
//!     // Spawn protocol-specific workers
//!     runner.spawn(my_worker(runner.publisher(), runner.shutdown_signal()));
//!
//!     // Run until Ctrl+C
//!     runner.run_with_metadata(None).await
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, validate_mqtt};
pub use error::{BridgeError, Result};
pub use publisher::{MessagePublisher, MqttPublisher};
pub use runner::BridgeRunner;
pub use status::{BridgeStatus, STATUS_OFFLINE, STATUS_ONLINE, StatusPublisher};

// Re-export commonly used types from hasslink-common
pub use hasslink_common::{LogFormat, LoggingConfig, MqttConfig, TopicBuilder};
