//! Modbus client implementation
//!
//! This crate provides the client side connection lifecycle for Modbus RTU
//! and Modbus TCP devices. Callers issue register reads and writes; the
//! client opens the link lazily, serializes requests so that only one
//! exchange is in flight, bounds every exchange with a deadline, paces
//! successive requests and closes the link after a period of inactivity.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use modbus_client::ModbusClient;
//! use std::time::Duration;
//!
//! # async fn run() -> modbus_core::ModbusResult<()> {
//! let client = ModbusClient::builder()
//!     .tcp("192.168.1.100", 502)
//!     .execute_timeout(Duration::from_secs(2))
//!     .name_tag("boiler")
//!     .build()?;
//!
//! let values = client.read_holding_registers(100, 2).await?;
//! client.write_register(100, values[0] + 1).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod logger;
mod timer;

pub use client::ModbusClient;
pub use config::{ClientBuilder, ClientConfig, LinkConfig, Parity, SerialParams};
pub use connection::ConnectionState;
pub use logger::{
    logger, reset_logger, set_logger, ClientKind, ClientLogger, LogFacadeLogger, StderrLogger,
};
pub use modbus_core::{ErrorKind, ExceptionCode, ModbusError, ModbusResult};
pub use modbus_session::{LinkStatistics, SimulatorSettings};
