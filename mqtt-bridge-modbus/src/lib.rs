//! MQTT bridge for Modbus TCP devices.
//!
//! This bridge polls typed data points (coils and 16/32-bit registers) from
//! a Modbus TCP device and publishes their scaled values to MQTT. Every data
//! point is also announced to Home Assistant through MQTT discovery.
//!
//! # Topics
//!
//! ```text
//! <base_topic>/<device>/<datapoint>/state               value, not retained
//! <discovery_prefix>/sensor/<device>_<datapoint>/config discovery, retained
//! <base_topic>/status                                   bridge status, retained
//! ```
//!
//! Where `<device>` and `<datapoint>` are slugs of the configured names
//! (see [`hasslink_common::slugify`]).
//!
//! Devices with a `presence_coil` are only polled while that coil reads `true`.

pub mod config;
pub mod decoder;
pub mod discovery;
pub mod mock;
pub mod poller;
pub mod source;
