//! Session layer module for the Modbus client
//!
//! This crate turns a byte stream into request/response exchanges:
//!
//! - `crc`: CRC-16/MODBUS used by RTU framing
//! - `rtu`: RTU ADU encoding and length-driven frame reading
//! - `mbap`: MBAP header used by Modbus TCP
//! - `link`: the [`Link`] exchange contract with RTU and TCP implementations
//! - `simulator`: an in-memory [`Link`] that never touches real I/O
//! - `statistics`: per-link counters

pub mod crc;
pub mod link;
pub mod mbap;
pub mod rtu;
pub mod simulator;
pub mod statistics;

pub use link::{Link, RtuLink, TcpLink};
pub use mbap::{MbapHeader, MBAP_HEADER_LENGTH};
pub use modbus_core::{ModbusError, ModbusResult};
pub use simulator::{SimulatorLink, SimulatorSettings};
pub use statistics::LinkStatistics;

/// Format bytes as space separated hex for frame logging
pub(crate) fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
