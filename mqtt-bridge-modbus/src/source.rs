//! Register-read capability and its Modbus TCP implementation.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::error::Elapsed;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info};

use crate::config::{ModbusConnectionConfig, RegisterClass};

/// Response of a Modbus request bounded by a timeout.
type Timed<T> =
    Result<Result<Result<T, tokio_modbus::ExceptionCode>, tokio_modbus::Error>, Elapsed>;

/// Error returned by a single register read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Exception: {0}")]
    Exception(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Device returned no data")]
    Empty,
}

impl ReadError {
    /// Whether the connection is unusable after this error.
    ///
    /// Exception responses come from a healthy connection and keep it.
    pub fn drops_connection(&self) -> bool {
        matches!(self, ReadError::Transport(_) | ReadError::Timeout)
    }
}

/// Capability to read single coils and registers from a Modbus device.
///
/// Every call is an independent request and can fail independently.
#[async_trait]
pub trait RegisterSource: Send {
    /// Read one coil.
    async fn read_coil(&mut self, address: u16) -> Result<bool, ReadError>;

    /// Read one holding register.
    async fn read_holding_register(&mut self, address: u16) -> Result<u16, ReadError>;

    /// Read one input register.
    async fn read_input_register(&mut self, address: u16) -> Result<u16, ReadError>;

    /// Read one register of the given class.
    async fn read_register(
        &mut self,
        class: RegisterClass,
        address: u16,
    ) -> Result<u16, ReadError> {
        match class {
            RegisterClass::Holding => self.read_holding_register(address).await,
            RegisterClass::Input => self.read_input_register(address).await,
        }
    }
}

/// Register source over a Modbus TCP connection.
///
/// Connects on first use and reconnects on the next read after a
/// transport failure or timeout. Exception responses keep the connection.
pub struct ModbusTcpSource {
    host: String,
    port: u16,
    slave: Slave,
    timeout: Duration,
    ctx: Option<Context>,
}

impl ModbusTcpSource {
    /// Create a source for the configured device. No connection is made yet.
    pub fn new(config: &ModbusConnectionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            slave: Slave(config.unit_id),
            timeout: Duration::from_millis(config.timeout_ms),
            ctx: None,
        }
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    async fn connect(
        target: String,
        slave: Slave,
        timeout: Duration,
    ) -> Result<Context, ReadError> {
        let addr = tokio::time::timeout(timeout, tokio::net::lookup_host(&target))
            .await
            .map_err(|_| ReadError::Timeout)?
            .map_err(|e| ReadError::Connection(format!("Cannot resolve {}: {}", target, e)))?
            .next()
            .ok_or_else(|| ReadError::Connection(format!("No address found for {}", target)))?;

        let ctx = tokio::time::timeout(timeout, tcp::connect_slave(addr, slave))
            .await
            .map_err(|_| ReadError::Connection("Connection timeout".to_string()))?
            .map_err(|e| ReadError::Connection(e.to_string()))?;

        info!("Connected to Modbus device at {} (unit {})", addr, slave.0);
        Ok(ctx)
    }

    async fn context(&mut self) -> Result<&mut Context, ReadError> {
        if self.ctx.is_none() {
            let target = format!("{}:{}", self.host, self.port);
            let ctx = Self::connect(target, self.slave, self.timeout).await?;
            self.ctx = Some(ctx);
        }

        self.ctx
            .as_mut()
            .ok_or_else(|| ReadError::Connection("Not connected".to_string()))
    }

    /// Map a response, dropping the connection when the error calls for it.
    fn settle<T>(&mut self, result: Timed<T>) -> Result<T, ReadError> {
        let result = map_response(result);
        if let Err(e) = &result {
            if e.drops_connection() {
                debug!("Dropping Modbus connection after error: {}", e);
                self.ctx = None;
            }
        }
        result
    }
}

/// Flatten the nested result of a timed Modbus request.
fn map_response<T>(result: Timed<T>) -> Result<T, ReadError> {
    match result {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(code))) => Err(ReadError::Exception(format!("{:?}", code))),
        Ok(Err(e)) => Err(ReadError::Transport(e.to_string())),
        Err(_) => Err(ReadError::Timeout),
    }
}

#[async_trait]
impl RegisterSource for ModbusTcpSource {
    async fn read_coil(&mut self, address: u16) -> Result<bool, ReadError> {
        let timeout = self.timeout;
        let ctx = self.context().await?;
        let result = tokio::time::timeout(timeout, ctx.read_coils(address, 1)).await;
        let bits = self.settle(result)?;
        bits.into_iter().next().ok_or(ReadError::Empty)
    }

    async fn read_holding_register(&mut self, address: u16) -> Result<u16, ReadError> {
        let timeout = self.timeout;
        let ctx = self.context().await?;
        let result =
            tokio::time::timeout(timeout, ctx.read_holding_registers(address, 1)).await;
        let words = self.settle(result)?;
        words.into_iter().next().ok_or(ReadError::Empty)
    }

    async fn read_input_register(&mut self, address: u16) -> Result<u16, ReadError> {
        let timeout = self.timeout;
        let ctx = self.context().await?;
        let result =
            tokio::time::timeout(timeout, ctx.read_input_registers(address, 1)).await;
        let words = self.settle(result)?;
        words.into_iter().next().ok_or(ReadError::Empty)
    }
}
