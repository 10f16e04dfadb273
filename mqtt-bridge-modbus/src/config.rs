//! Configuration for the Modbus bridge.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use hasslink_bridge_framework::{
    BridgeConfig, BridgeError, LoggingConfig, MqttConfig, Result, validate_mqtt,
};
use hasslink_common::DISCOVERY_PREFIX;

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusBridgeConfig {
    /// Modbus TCP connection settings
    pub modbus: ModbusConnectionConfig,

    /// MQTT connection settings
    pub mqtt: MqttConfig,

    /// Home Assistant discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Delay between the end of one poll cycle and the start of the next, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Devices to poll, in polling order
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_poll_interval() -> u64 {
    60
}

/// Modbus TCP connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModbusConnectionConfig {
    /// Host address (IP or hostname)
    pub host: String,

    /// TCP port (default: 502)
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Modbus unit/slave ID
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Connect and per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    3000
}

/// Home Assistant discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Discovery topic prefix
    #[serde(default = "default_discovery_prefix")]
    pub prefix: String,

    /// Manufacturer reported in the device descriptor
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,

    /// Model reported in the device descriptor
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_discovery_prefix() -> String {
    DISCOVERY_PREFIX.to_string()
}

fn default_manufacturer() -> String {
    "Paradigma".to_string()
}

fn default_model() -> String {
    "SystaComfortII".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            prefix: default_discovery_prefix(),
            manufacturer: default_manufacturer(),
            model: default_model(),
        }
    }
}

/// Configuration for a single device behind the Modbus connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name (unique, used in topics and discovery)
    pub name: String,

    /// Coil that must read `true` for the device to be polled
    #[serde(default)]
    pub presence_coil: Option<u16>,

    /// Data points to read, in polling order
    #[serde(default)]
    pub datapoints: Vec<DataPointConfig>,
}

/// Configuration for a single typed data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPointConfig {
    /// Data point name (unique within its device)
    pub name: String,

    /// Modbus address (0-based); 32-bit values also occupy `address + 1`
    pub address: u16,

    /// Value type
    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Register class for register-backed types (ignored for `bool`)
    #[serde(default, rename = "register_type")]
    pub register_class: RegisterClass,

    /// Scaling factor applied to the decoded value
    #[serde(default = "default_scaling")]
    pub scaling: f64,

    /// Unit of measurement (for discovery metadata)
    #[serde(default)]
    pub unit: Option<String>,
}

fn default_scaling() -> f64 {
    1.0
}

/// Type a data point's raw register content is decoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Single coil bit
    Bool,
    /// Unsigned 16-bit integer (1 register)
    Uint16,
    /// Signed 16-bit integer (1 register)
    Int16,
    /// Unsigned 32-bit integer (2 registers, high word first)
    Uint32,
    /// Signed 32-bit integer (2 registers, high word first)
    Int32,
}

impl ValueType {
    /// Return the configuration name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Uint16 => "uint16",
            ValueType::Int16 => "int16",
            ValueType::Uint32 => "uint32",
            ValueType::Int32 => "int32",
        }
    }

    /// Number of consecutive addresses the value occupies.
    pub fn width(&self) -> u16 {
        match self {
            ValueType::Bool | ValueType::Uint16 | ValueType::Int16 => 1,
            ValueType::Uint32 | ValueType::Int32 => 2,
        }
    }
}

/// Modbus 16-bit register classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterClass {
    /// Holding registers (read/write, 16-bit)
    #[default]
    Holding,
    /// Input registers (read-only, 16-bit)
    Input,
}

impl RegisterClass {
    /// Return the string name for this register class.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterClass::Holding => "holding",
            RegisterClass::Input => "input",
        }
    }
}

impl BridgeConfig for ModbusBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<()> {
        validate_mqtt(&self.mqtt)?;

        if self.modbus.host.is_empty() {
            return Err(BridgeError::validation("modbus.host cannot be empty"));
        }

        if self.poll_interval_secs == 0 {
            return Err(BridgeError::validation(
                "poll_interval_secs must be greater than 0",
            ));
        }

        if self.discovery.prefix.trim_matches('/').is_empty() {
            return Err(BridgeError::validation("discovery.prefix cannot be empty"));
        }

        let mut device_names = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(BridgeError::validation("Device name cannot be empty"));
            }

            if !device_names.insert(device.name.as_str()) {
                return Err(BridgeError::validation(format!(
                    "Duplicate device name '{}'",
                    device.name
                )));
            }

            device.validate()?;
        }

        Ok(())
    }
}

impl DeviceConfig {
    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();

        for dp in &self.datapoints {
            if dp.name.trim().is_empty() {
                return Err(BridgeError::validation(format!(
                    "Device '{}': data point name cannot be empty",
                    self.name
                )));
            }

            if !names.insert(dp.name.as_str()) {
                return Err(BridgeError::validation(format!(
                    "Device '{}': duplicate data point '{}'",
                    self.name, dp.name
                )));
            }

            if dp.address.checked_add(dp.value_type.width() - 1).is_none() {
                return Err(BridgeError::validation(format!(
                    "Device '{}': data point '{}' of type {} at address {} exceeds the register space",
                    self.name,
                    dp.name,
                    dp.value_type.as_str(),
                    dp.address
                )));
            }

            if !dp.scaling.is_finite() {
                return Err(BridgeError::validation(format!(
                    "Device '{}': data point '{}' has a non-finite scaling factor",
                    self.name, dp.name
                )));
            }
        }

        Ok(())
    }
}
