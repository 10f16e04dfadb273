use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// MQTT broker connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or IP address.
    pub host: String,

    /// Broker TCP port.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Root of every state and status topic published by the bridge.
    pub base_topic: String,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Optional username for broker authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for broker authentication.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "hasslink-modbus".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

impl MqttConfig {
    /// Create a configuration with defaults for everything but the broker and base topic.
    pub fn new(host: impl Into<String>, base_topic: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_mqtt_port(),
            base_topic: base_topic.into(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            username: None,
            password: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Load a configuration file in JSON5 format.
///
/// Plain JSON files are accepted as well, JSON being a subset of JSON5.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Parse(e.to_string()))
}
