//! PDU encoding and decoding
//!
//! The PDU is the function code followed by function specific data. It is
//! framed by the session layer (RTU unit id + CRC, or an MBAP header).
//!
//! # Decoding policy
//! - Exception responses (function code | 0x80) become `ModbusError::Protocol`
//! - A response that does not match its request (wrong function code, wrong
//!   byte count, truncated data, wrong write echo) is a corrupt exchange and
//!   becomes `ModbusError::Connection`, so the link is reopened

use crate::error::{ModbusError, ModbusResult};
use crate::function::EXCEPTION_FLAG;
use crate::request::{Operation, Request, Response};
use bytes::{BufMut, BytesMut};

/// Coil ON value in write single coil requests
const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

/// Maximum PDU length
pub const MAX_PDU_LENGTH: usize = 253;

/// Encode the request PDU
pub fn encode_request(request: &Request) -> BytesMut {
    let mut buf = BytesMut::with_capacity(6);
    buf.put_u8(request.function().value());
    buf.put_u16(request.address());

    match request.operation() {
        Operation::ReadCoils { quantity }
        | Operation::ReadDiscreteInputs { quantity }
        | Operation::ReadHoldingRegisters { quantity }
        | Operation::ReadInputRegisters { quantity } => {
            buf.put_u16(*quantity);
        }
        Operation::WriteSingleCoil { value } => {
            buf.put_u16(if *value { COIL_ON } else { COIL_OFF });
        }
        Operation::WriteSingleRegister { value } => {
            buf.put_u16(*value);
        }
        Operation::WriteMultipleCoils { values } => {
            let packed = pack_bits(values);
            buf.put_u16(values.len() as u16);
            buf.put_u8(packed.len() as u8);
            buf.put_slice(&packed);
        }
        Operation::WriteMultipleRegisters { values } => {
            buf.put_u16(values.len() as u16);
            buf.put_u8((values.len() * 2) as u8);
            for value in values {
                buf.put_u16(*value);
            }
        }
    }

    buf
}

/// Decode a response PDU against the request that produced it
///
/// # Errors
/// - `ModbusError::Protocol` for an exception response
/// - `ModbusError::Connection` for a malformed or mismatched response
pub fn decode_response(request: &Request, pdu: &[u8]) -> ModbusResult<Response> {
    let function = request.function();
    let Some((&code, data)) = pdu.split_first() else {
        return Err(ModbusError::connection("empty response PDU"));
    };

    if code == function.value() | EXCEPTION_FLAG {
        let exception = data
            .first()
            .copied()
            .ok_or_else(|| ModbusError::connection("exception response without code"))?;
        return Err(ModbusError::exception(function.value(), exception));
    }
    if code != function.value() {
        return Err(ModbusError::connection(format!(
            "function code mismatch: expected 0x{:02X}, got 0x{:02X}",
            function.value(),
            code
        )));
    }

    match request.operation() {
        Operation::ReadCoils { quantity } => {
            Ok(Response::Coils(decode_bits(data, *quantity)?))
        }
        Operation::ReadDiscreteInputs { quantity } => {
            Ok(Response::DiscreteInputs(decode_bits(data, *quantity)?))
        }
        Operation::ReadHoldingRegisters { .. } => {
            Ok(Response::HoldingRegisters(decode_registers(data)?))
        }
        Operation::ReadInputRegisters { .. } => {
            Ok(Response::InputRegisters(decode_registers(data)?))
        }
        Operation::WriteSingleCoil { value } => {
            let (address, raw) = decode_echo(data)?;
            let expected = if *value { COIL_ON } else { COIL_OFF };
            check_echo(request, address, raw, expected)?;
            Ok(Response::WriteSingleCoil {
                address,
                value: raw == COIL_ON,
            })
        }
        Operation::WriteSingleRegister { value } => {
            let (address, raw) = decode_echo(data)?;
            check_echo(request, address, raw, *value)?;
            Ok(Response::WriteSingleRegister { address, value: raw })
        }
        Operation::WriteMultipleCoils { .. } => {
            let (address, quantity) = decode_echo(data)?;
            check_echo(request, address, quantity, request.quantity())?;
            Ok(Response::WriteMultipleCoils { address, quantity })
        }
        Operation::WriteMultipleRegisters { .. } => {
            let (address, quantity) = decode_echo(data)?;
            check_echo(request, address, quantity, request.quantity())?;
            Ok(Response::WriteMultipleRegisters { address, quantity })
        }
    }
}

/// Pack bits LSB-first into bytes
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut packed = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    packed
}

/// Unpack LSB-first bytes into `count` bits
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
        .collect()
}

fn byte_counted(data: &[u8]) -> ModbusResult<&[u8]> {
    let Some((&byte_count, payload)) = data.split_first() else {
        return Err(ModbusError::connection("response without byte count"));
    };
    if payload.len() != byte_count as usize {
        return Err(ModbusError::connection(format!(
            "byte count mismatch: header says {}, got {}",
            byte_count,
            payload.len()
        )));
    }
    Ok(payload)
}

fn decode_bits(data: &[u8], quantity: u16) -> ModbusResult<Vec<bool>> {
    let payload = byte_counted(data)?;
    let expected = (quantity as usize).div_ceil(8);
    if payload.len() < expected {
        return Err(ModbusError::connection(format!(
            "bit response too short: expected {} bytes, got {}",
            expected,
            payload.len()
        )));
    }
    Ok(unpack_bits(payload, quantity as usize))
}

// The register count is returned as received; the client compares it with
// the requested quantity.
fn decode_registers(data: &[u8]) -> ModbusResult<Vec<u16>> {
    let payload = byte_counted(data)?;
    if payload.len() % 2 != 0 {
        return Err(ModbusError::connection(format!(
            "odd register payload length {}",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

fn decode_echo(data: &[u8]) -> ModbusResult<(u16, u16)> {
    if data.len() != 4 {
        return Err(ModbusError::connection(format!(
            "write response must carry 4 bytes, got {}",
            data.len()
        )));
    }
    Ok((
        u16::from_be_bytes([data[0], data[1]]),
        u16::from_be_bytes([data[2], data[3]]),
    ))
}

fn check_echo(request: &Request, address: u16, got: u16, expected: u16) -> ModbusResult<()> {
    if address != request.address() || got != expected {
        return Err(ModbusError::connection(format!(
            "{} echo mismatch: sent {}/{}, got {}/{}",
            request.function().as_str(),
            request.address(),
            expected,
            address,
            got
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ExceptionCode};

    #[test]
    fn test_encode_read_holding_registers() {
        let request = Request::read_holding_registers(1, 0x006B, 3).unwrap();
        assert_eq!(&encode_request(&request)[..], &[0x03, 0x00, 0x6B, 0x00, 0x03]);
    }

    #[test]
    fn test_encode_write_multiple_coils() {
        let bits = vec![true, false, true, true, false, false, true, true, true, false];
        let request = Request::write_multiple_coils(1, 0x0013, bits).unwrap();
        assert_eq!(
            &encode_request(&request)[..],
            &[0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]
        );
    }

    #[test]
    fn test_encode_write_single_coil() {
        let request = Request::write_single_coil(1, 0x00AC, true).unwrap();
        assert_eq!(&encode_request(&request)[..], &[0x05, 0x00, 0xAC, 0xFF, 0x00]);
    }

    #[test]
    fn test_decode_registers() {
        let request = Request::read_holding_registers(1, 0x006B, 3).unwrap();
        let pdu = [0x03, 0x06, 0x02, 0x2B, 0x00, 0x00, 0x00, 0x64];
        let response = decode_response(&request, &pdu).unwrap();
        assert_eq!(response, Response::HoldingRegisters(vec![0x022B, 0x0000, 0x0064]));
    }

    #[test]
    fn test_decode_coils_truncates_padding() {
        let request = Request::read_coils(1, 0x0013, 10).unwrap();
        let pdu = [0x01, 0x02, 0xCD, 0x01];
        let bits = decode_response(&request, &pdu).unwrap().into_bits().unwrap();
        assert_eq!(bits.len(), 10);
        assert_eq!(
            bits,
            vec![true, false, true, true, false, false, true, true, true, false]
        );
    }

    #[test]
    fn test_decode_exception_response() {
        let request = Request::read_input_registers(1, 0x0008, 1).unwrap();
        let err = decode_response(&request, &[0x84, 0x02]).unwrap_err();
        assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalDataAddress));
    }

    #[test]
    fn test_decode_mismatches_are_connection_errors() {
        let request = Request::read_holding_registers(1, 0, 2).unwrap();
        let wrong_function = decode_response(&request, &[0x04, 0x02, 0x00, 0x01]).unwrap_err();
        assert_eq!(wrong_function.kind(), ErrorKind::Connection);

        let short = decode_response(&request, &[0x03, 0x04, 0x00, 0x01]).unwrap_err();
        assert_eq!(short.kind(), ErrorKind::Connection);

        let write = Request::write_single_register(1, 7, 42).unwrap();
        let bad_echo = decode_response(&write, &[0x06, 0x00, 0x07, 0x00, 0x2B]).unwrap_err();
        assert_eq!(bad_echo.kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_decode_write_multiple_registers_ack() {
        let request = Request::write_multiple_registers(1, 0x0001, vec![0x000A, 0x0102]).unwrap();
        assert_eq!(
            &encode_request(&request)[..],
            &[0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
        let response = decode_response(&request, &[0x10, 0x00, 0x01, 0x00, 0x02]).unwrap();
        assert_eq!(
            response,
            Response::WriteMultipleRegisters {
                address: 1,
                quantity: 2
            }
        );
    }
}
