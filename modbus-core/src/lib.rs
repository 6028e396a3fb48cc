//! Core types and utilities for the Modbus client
//!
//! This crate provides the error taxonomy shared by every layer, the
//! function and exception codes defined by the Modbus application protocol,
//! the request/response model and the PDU encoder/decoder.

pub mod error;
pub mod function;
pub mod pdu;
pub mod request;

pub use error::{ErrorKind, ExceptionCode, ModbusError, ModbusResult};
pub use function::FunctionCode;
pub use request::{Operation, Request, Response, DEFAULT_UNIT_ID};
