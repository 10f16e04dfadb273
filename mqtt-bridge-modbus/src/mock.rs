//! In-memory register source and publisher for testing.
//!
//! Lets the decoder and poller run without a Modbus device or MQTT broker.
//! Both types share their recorded history between clones, so a test can
//! keep a handle after moving the original into a poller.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use hasslink_bridge_framework::MessagePublisher;

use crate::source::{ReadError, RegisterSource};

/// A read request seen by [`MockRegisterSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCall {
    Coil(u16),
    Holding(u16),
    Input(u16),
}

impl ReadCall {
    fn address(&self) -> u16 {
        match *self {
            ReadCall::Coil(a) | ReadCall::Holding(a) | ReadCall::Input(a) => a,
        }
    }
}

/// Register source backed by fixed coil and register tables.
///
/// Addresses missing from the tables answer with an exception, like a
/// device would for an illegal data address.
#[derive(Debug, Clone, Default)]
pub struct MockRegisterSource {
    coils: HashMap<u16, bool>,
    holding: HashMap<u16, u16>,
    input: HashMap<u16, u16>,
    failing: HashSet<u16>,
    fail_all: bool,
    calls: Arc<Mutex<Vec<ReadCall>>>,
}

impl MockRegisterSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coil(mut self, address: u16, value: bool) -> Self {
        self.coils.insert(address, value);
        self
    }

    pub fn with_holding(mut self, address: u16, value: u16) -> Self {
        self.holding.insert(address, value);
        self
    }

    pub fn with_input(mut self, address: u16, value: u16) -> Self {
        self.input.insert(address, value);
        self
    }

    /// Fail every read at `address` with a transport error.
    pub fn failing_at(mut self, address: u16) -> Self {
        self.failing.insert(address);
        self
    }

    /// Fail every read with a connection error.
    pub fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Reads issued so far, in order.
    pub fn calls(&self) -> Vec<ReadCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: ReadCall) -> Result<(), ReadError> {
        lock(&self.calls).push(call);

        if self.fail_all {
            return Err(ReadError::Connection("Connection refused".to_string()));
        }
        if self.failing.contains(&call.address()) {
            return Err(ReadError::Transport("Broken pipe".to_string()));
        }
        Ok(())
    }
}

fn illegal_address() -> ReadError {
    ReadError::Exception("IllegalDataAddress".to_string())
}

#[async_trait]
impl RegisterSource for MockRegisterSource {
    async fn read_coil(&mut self, address: u16) -> Result<bool, ReadError> {
        self.record(ReadCall::Coil(address))?;
        self.coils.get(&address).copied().ok_or_else(illegal_address)
    }

    async fn read_holding_register(&mut self, address: u16) -> Result<u16, ReadError> {
        self.record(ReadCall::Holding(address))?;
        self.holding.get(&address).copied().ok_or_else(illegal_address)
    }

    async fn read_input_register(&mut self, address: u16) -> Result<u16, ReadError> {
        self.record(ReadCall::Input(address))?;
        self.input.get(&address).copied().ok_or_else(illegal_address)
    }
}

/// A message captured by [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl PublishedMessage {
    /// Payload as UTF-8 text.
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or_default()
    }

    /// Payload parsed as JSON, if it is JSON.
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

/// Publisher that records every message instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages published so far, in order.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        lock(&self.messages).clone()
    }

    /// Messages published to topics ending with `suffix`.
    pub fn messages_ending_with(&self, suffix: &str) -> Vec<PublishedMessage> {
        lock(&self.messages)
            .iter()
            .filter(|m| m.topic.ends_with(suffix))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.messages).clear();
    }
}

impl MessagePublisher for RecordingPublisher {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> hasslink_bridge_framework::Result<()> {
        lock(&self.messages).push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
