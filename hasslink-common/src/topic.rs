use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Default Home Assistant discovery prefix.
pub const DISCOVERY_PREFIX: &str = "homeassistant";

/// Any run of characters that are not allowed in a slug.
static SLUG_INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_-]+").unwrap());

/// Convert a human-readable name into a topic-safe slug.
///
/// The input is lowercased, every run of characters outside `[a-z0-9_-]`
/// collapses into a single underscore, and leading/trailing underscores are
/// trimmed.
///
/// # Example
/// ```
/// use hasslink_common::topic::slugify;
///
/// assert_eq!(slugify("Heating Circuit 1"), "heating_circuit_1");
/// assert_eq!(slugify("  Flow (°C) "), "flow_c");
/// ```
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    SLUG_INVALID
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Builder for the MQTT topics and identifiers of a bridge.
///
/// Topics follow the patterns:
/// - `<base_topic>/<device>/<datapoint>/state` for values
/// - `<discovery_prefix>/sensor/<device>_<datapoint>/config` for discovery
/// - `<base_topic>/status` for bridge status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    base_topic: String,
    discovery_prefix: String,
}

impl TopicBuilder {
    /// Create a topic builder.
    ///
    /// Trailing slashes are stripped. Empty topics and MQTT wildcards are rejected.
    pub fn new(base_topic: &str, discovery_prefix: &str) -> Result<Self> {
        Ok(Self {
            base_topic: checked_root(base_topic, "base topic")?,
            discovery_prefix: checked_root(discovery_prefix, "discovery prefix")?,
        })
    }

    /// Create a builder using the default Home Assistant discovery prefix.
    pub fn with_default_prefix(base_topic: &str) -> Result<Self> {
        Self::new(base_topic, DISCOVERY_PREFIX)
    }

    /// Get the base topic.
    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Get the discovery prefix.
    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    /// Build the state topic for a data point.
    ///
    /// # Example
    /// ```
    /// use hasslink_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::with_default_prefix("systa").unwrap();
    /// assert_eq!(
    ///     topics.state_topic("Heating Circuit 1", "Flow Temperature"),
    ///     "systa/heating_circuit_1/flow_temperature/state"
    /// );
    /// ```
    pub fn state_topic(&self, device: &str, datapoint: &str) -> String {
        format!(
            "{}/{}/{}/state",
            self.base_topic,
            slugify(device),
            slugify(datapoint)
        )
    }

    /// Build the discovery config topic for a data point.
    ///
    /// # Example
    /// ```
    /// use hasslink_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::with_default_prefix("systa").unwrap();
    /// assert_eq!(
    ///     topics.discovery_topic("Boiler", "Water Temp"),
    ///     "homeassistant/sensor/boiler_water_temp/config"
    /// );
    /// ```
    pub fn discovery_topic(&self, device: &str, datapoint: &str) -> String {
        format!(
            "{}/sensor/{}/config",
            self.discovery_prefix,
            slugify(&unique_id(device, datapoint))
        )
    }

    /// Build the bridge status topic.
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.base_topic)
    }
}

/// Identifier of a device in discovery payloads.
pub fn device_identifier(device: &str) -> String {
    slugify(device)
}

/// Unique id of a data point in discovery payloads (not slugged).
pub fn unique_id(device: &str, datapoint: &str) -> String {
    format!("{}_{}", device, datapoint)
}

fn checked_root(topic: &str, what: &str) -> Result<String> {
    let trimmed = topic.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Topic(format!("{} cannot be empty", what)));
    }
    if trimmed.contains(['+', '#']) {
        return Err(Error::Topic(format!(
            "{} '{}' must not contain MQTT wildcards",
            what, topic
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clean(slug: &str) -> bool {
        slug.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            && !slug.starts_with('_')
            && !slug.ends_with('_')
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Outdoor Temperature"), "outdoor_temperature");
        assert_eq!(slugify("Buffer-Tank top"), "buffer-tank_top");
        assert_eq!(slugify("already_slugged"), "already_slugged");
    }

    #[test]
    fn test_slugify_collapses_runs() {
        assert_eq!(slugify("a  ::  b"), "a_b");
        assert_eq!(slugify("a__b"), "a__b");
        assert_eq!(slugify("Pump / Circuit #2"), "pump_circuit_2");
    }

    #[test]
    fn test_slugify_trims_underscores() {
        assert_eq!(slugify("  leading and trailing  "), "leading_and_trailing");
        assert_eq!(slugify("__x__"), "x");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_slugify_non_ascii() {
        assert_eq!(slugify("Außen Temp °C"), "au_en_temp_c");
        assert_eq!(slugify("ÄÖÜ"), "");
    }

    #[test]
    fn test_slugify_properties() {
        let inputs = [
            "Heating Circuit 1",
            "  Flow (°C) ",
            "__weird__--name__",
            "UPPER-lower_Mixed 42",
            "Ωmega/ß/test",
            "-dash-",
            "tab\tand\nnewline",
            "",
        ];

        for input in inputs {
            let slug = slugify(input);
            assert!(is_clean(&slug), "slug {:?} of {:?} is not clean", slug, input);
            assert_eq!(slugify(&slug), slug, "slugify is not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_case_and_separator_variants_converge() {
        assert_eq!(slugify("Flow Temp"), slugify("flow temp"));
        assert_eq!(slugify("Flow Temp"), slugify("Flow.Temp"));
    }

    #[test]
    fn test_topic_builder() {
        let topics = TopicBuilder::with_default_prefix("systa/").unwrap();

        assert_eq!(topics.base_topic(), "systa");
        assert_eq!(topics.discovery_prefix(), "homeassistant");
        assert_eq!(
            topics.state_topic("Heating Circuit 1", "Flow Temperature"),
            "systa/heating_circuit_1/flow_temperature/state"
        );
        assert_eq!(
            topics.discovery_topic("Heating Circuit 1", "Flow Temperature"),
            "homeassistant/sensor/heating_circuit_1_flow_temperature/config"
        );
        assert_eq!(topics.status_topic(), "systa/status");
    }

    #[test]
    fn test_custom_discovery_prefix() {
        let topics = TopicBuilder::new("plant", "ha-test").unwrap();
        assert_eq!(
            topics.discovery_topic("Dev", "Point"),
            "ha-test/sensor/dev_point/config"
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(device_identifier("Heating Circuit 1"), "heating_circuit_1");
        assert_eq!(unique_id("Heating Circuit 1", "Flow"), "Heating Circuit 1_Flow");
    }

    #[test]
    fn test_invalid_roots() {
        assert!(TopicBuilder::with_default_prefix("").is_err());
        assert!(TopicBuilder::with_default_prefix("/").is_err());
        assert!(TopicBuilder::with_default_prefix("systa/#").is_err());
        assert!(TopicBuilder::new("systa", "home+assistant").is_err());
    }
}
