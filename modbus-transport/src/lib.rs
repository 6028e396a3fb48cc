//! Transport layer module for the Modbus client
//!
//! This crate provides byte stream transports for TCP and serial lines.
//! Framing (RTU, MBAP) is done one layer up, in `modbus-session`.

pub mod serial;
pub mod stream;
pub mod tcp;

pub use modbus_core::{ModbusError, ModbusResult};
pub use serial::{SerialSettings, SerialTransport};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
