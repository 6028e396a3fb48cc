//! RTU framing
//!
//! An RTU ADU is the unit id, the PDU and a CRC-16 (low byte first).
//! Responses are read by length: the first three bytes (unit id, function
//! code and either the byte count or the first data byte) determine how many
//! bytes remain, so no inter-character timing is needed to find the frame end.
//!
//! # Frame Sizes
//! ```text
//! exception response:  unit | fc|0x80 | code | crc crc           = 5
//! read response:       unit | fc | n | n data bytes | crc crc   = 5 + n
//! write response:      unit | fc | addr addr | val val | crc crc = 8
//! ```

use crate::crc;
use modbus_core::function::EXCEPTION_FLAG;
use modbus_core::pdu::{self, MAX_PDU_LENGTH};
use modbus_core::{FunctionCode, ModbusError, ModbusResult, Request};
use modbus_transport::StreamAccessor;

/// Maximum RTU ADU length (unit id + PDU + CRC)
pub const MAX_ADU_LENGTH: usize = MAX_PDU_LENGTH + 3;

const HEADER_LENGTH: usize = 3;

/// Encode a request as an RTU ADU
pub fn encode_adu(request: &Request) -> Vec<u8> {
    let pdu = pdu::encode_request(request);
    let mut adu = Vec::with_capacity(pdu.len() + 3);
    adu.push(request.unit_id());
    adu.extend_from_slice(&pdu);
    let crc = crc::checksum(&adu);
    adu.extend_from_slice(&crc.to_le_bytes());
    adu
}

/// Total response ADU length given its first three bytes
pub fn response_length(header: &[u8; HEADER_LENGTH]) -> ModbusResult<usize> {
    let function = header[1];
    if function & EXCEPTION_FLAG != 0 {
        return Ok(5);
    }
    match FunctionCode::from_u8(function) {
        Some(code) if code.is_read() => Ok(HEADER_LENGTH + header[2] as usize + 2),
        Some(_) => Ok(8),
        None => Err(ModbusError::connection(format!(
            "unsupported function code 0x{:02X} in RTU response",
            function
        ))),
    }
}

/// Read one response ADU from the stream
pub async fn read_adu<S>(stream: &mut S) -> ModbusResult<Vec<u8>>
where
    S: StreamAccessor + ?Sized,
{
    let mut header = [0u8; HEADER_LENGTH];
    stream.read_exact(&mut header).await?;

    let total = response_length(&header)?;
    if total > MAX_ADU_LENGTH {
        return Err(ModbusError::connection(format!(
            "RTU frame too large: {} bytes",
            total
        )));
    }

    let mut frame = vec![0u8; total];
    frame[..HEADER_LENGTH].copy_from_slice(&header);
    stream.read_exact(&mut frame[HEADER_LENGTH..]).await?;
    Ok(frame)
}

/// Validate a response ADU and return its PDU
///
/// # Errors
/// Returns `ModbusError::Connection` on CRC mismatch or when the frame comes
/// from a different unit than the one addressed.
pub fn decode_adu(unit_id: u8, frame: &[u8]) -> ModbusResult<&[u8]> {
    crc::validate(frame)?;
    if frame[0] != unit_id {
        return Err(ModbusError::connection(format!(
            "response from unit {}, expected unit {}",
            frame[0], unit_id
        )));
    }
    Ok(&frame[1..frame.len() - 2])
}
