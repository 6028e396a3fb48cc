//! modbus-link - Modbus RTU/TCP client for Rust
//!
//! Callers read and write registers without managing sockets or serial
//! ports. The client opens the link on first use, keeps one request in
//! flight at a time, bounds each request with a timeout, paces successive
//! requests and closes the link once it has been idle long enough.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `modbus-core`: Error taxonomy, function and exception codes, PDU codec
//! - `modbus-transport`: Byte stream transports (TCP, Serial)
//! - `modbus-session`: RTU and MBAP framing, the `Link` trait, the simulator
//! - `modbus-client`: Connection lifecycle, request serialization, idle timer
//!
//! # Usage
//!
//! ```no_run
//! use modbus_link::client::ModbusClient;
//!
//! # async fn run() -> modbus_link::ModbusResult<()> {
//! let client = ModbusClient::builder().serial("/dev/ttyUSB0", 9600).build()?;
//! let registers = client.read_input_registers_from(17, 0, 4).await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use modbus_core::{ErrorKind, ExceptionCode, FunctionCode, ModbusError, ModbusResult};

// Re-export client API
pub mod client {
    pub use modbus_client::*;
}

// Re-export framing and link backends
pub mod session {
    pub use modbus_session::*;
}

// Re-export byte stream transports
pub mod transport {
    pub use modbus_transport::*;
}
