//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// MQTT client setup error.
    #[error("MQTT connection error: {0}")]
    MqttConnection(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a publish error for a topic.
    pub fn publish(topic: impl Into<String>, message: impl ToString) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.to_string(),
        }
    }
}

impl From<hasslink_common::Error> for BridgeError {
    fn from(err: hasslink_common::Error) -> Self {
        match err {
            hasslink_common::Error::Parse(msg) => Self::ConfigParse(msg),
            hasslink_common::Error::Io(e) => Self::Io(e),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_message() {
        let err = BridgeError::publish("systa/status", "request queue full");
        assert_eq!(
            err.to_string(),
            "Failed to publish to systa/status: request queue full"
        );
    }

    #[test]
    fn test_from_common_error() {
        let parse = hasslink_common::Error::Parse("unexpected end".to_string());
        assert!(matches!(BridgeError::from(parse), BridgeError::ConfigParse(_)));

        let topic = hasslink_common::Error::Topic("empty".to_string());
        assert!(matches!(BridgeError::from(topic), BridgeError::Config(_)));
    }
}
