//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use hasslink_common::{load_config, parse_config};

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use hasslink_bridge_framework::{BridgeConfig, MqttConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
///     pub devices: Vec<MyDevice>,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the MQTT configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation;
    /// overrides should still call [`validate_mqtt`].
    fn validate(&self) -> Result<()> {
        validate_mqtt(self.mqtt())
    }

    /// Parse configuration from a JSON5 string and validate it.
    fn parse(content: &str) -> Result<Self> {
        let config: Self = parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let config: Self = load_config(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Validate the MQTT section shared by every bridge.
pub fn validate_mqtt(mqtt: &MqttConfig) -> Result<()> {
    if mqtt.host.is_empty() {
        return Err(BridgeError::validation("mqtt.host cannot be empty"));
    }
    if mqtt.base_topic.trim_matches('/').is_empty() {
        return Err(BridgeError::validation("mqtt.base_topic cannot be empty"));
    }
    if mqtt.base_topic.contains(['+', '#']) {
        return Err(BridgeError::validation(
            "mqtt.base_topic must not contain MQTT wildcards",
        ));
    }
    if mqtt.keep_alive_secs < 5 {
        return Err(BridgeError::validation(
            "mqtt.keep_alive_secs must be at least 5",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("hasslink-{}.json5", std::process::id()));
        std::fs::write(&path, r#"{ mqtt: { host: "broker", base_topic: "systa" } }"#).unwrap();

        let result = TestConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(result.unwrap().mqtt().host, "broker");
    }

    #[test]
    fn test_parse_valid() {
        let config = TestConfig::parse(r#"{ mqtt: { host: "localhost", base_topic: "systa" } }"#)
            .unwrap();
        assert_eq!(config.mqtt().host, "localhost");
        assert_eq!(config.logging().level, "info");
    }

    #[test]
    fn test_parse_error() {
        let result = TestConfig::parse("{ mqtt: ");
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_validate_base_topic() {
        let result = TestConfig::parse(r#"{ mqtt: { host: "localhost", base_topic: "/" } }"#);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_validate_keep_alive() {
        let result = TestConfig::parse(
            r#"{ mqtt: { host: "localhost", base_topic: "t", keep_alive_secs: 1 } }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }
}
