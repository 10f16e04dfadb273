//! Integration tests for hasslink-common library.

use hasslink_common::{
    LogFormat, LoggingConfig, MqttConfig, TopicBuilder, device_identifier, parse_config, slugify,
    unique_id,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BridgeFile {
    mqtt: MqttConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
fn test_topics_from_parsed_config() {
    let config: BridgeFile = parse_config(
        r#"{
            mqtt: { host: "broker", base_topic: "systa" },
            logging: { level: "warn" },
        }"#,
    )
    .expect("config should parse");

    let topics = TopicBuilder::with_default_prefix(&config.mqtt.base_topic).unwrap();

    assert_eq!(
        topics.state_topic("Solar Collector", "Temperature"),
        "systa/solar_collector/temperature/state"
    );
    assert_eq!(
        topics.discovery_topic("Solar Collector", "Temperature"),
        "homeassistant/sensor/solar_collector_temperature/config"
    );
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, LogFormat::Text);
}

#[test]
fn test_discovery_topic_uses_slug_of_joined_name() {
    let topics = TopicBuilder::with_default_prefix("base").unwrap();

    // The unique id keeps the original spelling, the topic uses its slug.
    let id = unique_id("Buffer Tank", "Top (°C)");
    assert_eq!(id, "Buffer Tank_Top (°C)");
    assert_eq!(
        topics.discovery_topic("Buffer Tank", "Top (°C)"),
        format!("homeassistant/sensor/{}/config", slugify(&id))
    );
    assert_eq!(slugify(&id), "buffer_tank_top_c");
}

#[test]
fn test_state_topic_segments_are_slugs() {
    let topics = TopicBuilder::with_default_prefix("plant/heating").unwrap();
    let topic = topics.state_topic("Heat Pump #1", "Compressor / Hours");

    let segments: Vec<&str> = topic.split('/').collect();
    assert_eq!(
        segments,
        ["plant", "heating", "heat_pump_1", "compressor_hours", "state"]
    );
    assert_eq!(device_identifier("Heat Pump #1"), segments[2]);
}

#[test]
fn test_slug_is_stable_across_calls() {
    let names = ["Heating Circuit 1", "DHW", "Outdoor-Sensor", "  spaced  out  "];

    for name in names {
        assert_eq!(slugify(name), slugify(name));
        assert_eq!(slugify(&slugify(name)), slugify(name));
    }
}
