//! Error taxonomy for Modbus client operations
//!
//! Every fault raised by a transport, a framing layer or a remote device is
//! classified into one of four categories before it reaches a caller:
//!
//! - [`ModbusError::Config`]: caller supplied parameters are malformed, no I/O was attempted
//! - [`ModbusError::Connection`]: open/close failed, or the link broke mid-exchange
//! - [`ModbusError::Timeout`]: no response arrived before the deadline
//! - [`ModbusError::Protocol`]: the remote device answered with an exception code

use std::fmt;
use thiserror::Error;

/// Exception codes reported by a remote device in an exception response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetDevice,
    /// Any code outside the ones defined by the protocol
    Unknown(u8),
}

impl ExceptionCode {
    /// Decode an exception code byte
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::ServerDeviceFailure,
            0x05 => ExceptionCode::Acknowledge,
            0x06 => ExceptionCode::ServerDeviceBusy,
            0x08 => ExceptionCode::MemoryParityError,
            0x0A => ExceptionCode::GatewayPathUnavailable,
            0x0B => ExceptionCode::GatewayTargetDevice,
            other => ExceptionCode::Unknown(other),
        }
    }

    /// Raw code byte as transmitted on the wire
    pub fn value(&self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetDevice => 0x0B,
            ExceptionCode::Unknown(code) => *code,
        }
    }

    /// Human-readable description of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionCode::IllegalFunction => "illegal function",
            ExceptionCode::IllegalDataAddress => "illegal data address",
            ExceptionCode::IllegalDataValue => "illegal data value",
            ExceptionCode::ServerDeviceFailure => "slave device failure",
            ExceptionCode::Acknowledge => "acknowledge",
            ExceptionCode::ServerDeviceBusy => "slave device busy",
            ExceptionCode::MemoryParityError => "memory parity error",
            ExceptionCode::GatewayPathUnavailable => "gateway path unavailable",
            ExceptionCode::GatewayTargetDevice => "gateway target device failed to respond",
            ExceptionCode::Unknown(_) => "unknown exception",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} {}", self.value(), self.as_str())
    }
}

/// Error category, used when only the class of a failure matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Connection,
    Timeout,
    Protocol,
}

/// Main error type for Modbus client operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Protocol error: {code} ({message})")]
    Protocol { code: ExceptionCode, message: String },
}

impl ModbusError {
    pub fn config(message: impl Into<String>) -> Self {
        ModbusError::Config(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        ModbusError::Connection(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        ModbusError::Timeout(message.into())
    }

    /// Build a protocol error from an exception response
    ///
    /// # Arguments
    /// * `function` - Function code of the request that was rejected
    /// * `code` - Exception code byte reported by the remote device
    pub fn exception(function: u8, code: u8) -> Self {
        let code = ExceptionCode::from_u8(code);
        ModbusError::Protocol {
            code,
            message: format!(
                "device rejected function 0x{:02X}: {}",
                function,
                code.as_str()
            ),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ModbusError::Config(_) => ErrorKind::Config,
            ModbusError::Connection(_) => ErrorKind::Connection,
            ModbusError::Timeout(_) => ErrorKind::Timeout,
            ModbusError::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    /// Exception code carried by a protocol error
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        match self {
            ModbusError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the link must be considered unusable after this error
    ///
    /// Connection faults and timeouts leave the byte stream in an unknown
    /// position (a torn write, or a late response still in flight), so the
    /// link is reopened before the next request. Protocol errors come from a
    /// complete, well-formed exchange and leave the link intact.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, ModbusError::Connection(_) | ModbusError::Timeout(_))
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                ModbusError::Timeout(err.to_string())
            }
            _ => ModbusError::Connection(err.to_string()),
        }
    }
}

/// Result type alias for Modbus client operations
pub type ModbusResult<T> = Result<T, ModbusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_code_roundtrip_known_and_unknown() {
        assert_eq!(ExceptionCode::from_u8(0x02), ExceptionCode::IllegalDataAddress);
        assert_eq!(ExceptionCode::from_u8(0x06).value(), 0x06);
        assert_eq!(ExceptionCode::from_u8(0x42), ExceptionCode::Unknown(0x42));
        assert_eq!(ExceptionCode::Unknown(0x42).value(), 0x42);
    }

    #[test]
    fn test_io_errors_are_classified() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "no answer");
        assert_eq!(ModbusError::from(timed_out).kind(), ErrorKind::Timeout);

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert_eq!(ModbusError::from(reset).kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_exception_error_carries_code() {
        let err = ModbusError::exception(0x03, 0x02);
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalDataAddress));
        assert!(!err.requires_reconnect());
        assert!(err.to_string().contains("illegal data address"));
    }

    #[test]
    fn test_requires_reconnect() {
        assert!(ModbusError::connection("broken pipe").requires_reconnect());
        assert!(ModbusError::timeout("deadline").requires_reconnect());
        assert!(!ModbusError::config("bad count").requires_reconnect());
    }
}
