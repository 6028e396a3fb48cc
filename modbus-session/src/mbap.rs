//! MBAP header used by Modbus TCP

use modbus_core::{ModbusError, ModbusResult};

/// MBAP header length (transaction id, protocol id, length, unit id)
pub const MBAP_HEADER_LENGTH: usize = 7;

/// Protocol identifier of Modbus
const MODBUS_PROTOCOL_ID: u16 = 0;

/// MBAP header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MbapHeader {
    transaction_id: u16,
    protocol_id: u16,
    length: u16,
    unit_id: u8,
}

impl MbapHeader {
    /// Create a header for a PDU of `pdu_length` bytes
    pub fn new(transaction_id: u16, unit_id: u8, pdu_length: usize) -> Self {
        Self {
            transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            // The length field counts the unit id and the PDU
            length: (pdu_length + 1) as u16,
            unit_id,
        }
    }

    /// Encode header to bytes (big-endian)
    pub fn encode(&self) -> [u8; MBAP_HEADER_LENGTH] {
        let mut result = [0u8; MBAP_HEADER_LENGTH];
        result[0..2].copy_from_slice(&self.transaction_id.to_be_bytes());
        result[2..4].copy_from_slice(&self.protocol_id.to_be_bytes());
        result[4..6].copy_from_slice(&self.length.to_be_bytes());
        result[6] = self.unit_id;
        result
    }

    /// Decode header from bytes
    pub fn decode(data: &[u8]) -> ModbusResult<Self> {
        if data.len() < MBAP_HEADER_LENGTH {
            return Err(ModbusError::connection(format!(
                "MBAP header too short: expected {}, got {}",
                MBAP_HEADER_LENGTH,
                data.len()
            )));
        }

        let protocol_id = u16::from_be_bytes([data[2], data[3]]);
        if protocol_id != MODBUS_PROTOCOL_ID {
            return Err(ModbusError::connection(format!(
                "Invalid MBAP protocol id {}",
                protocol_id
            )));
        }
        let length = u16::from_be_bytes([data[4], data[5]]);
        if length < 2 {
            return Err(ModbusError::connection(format!(
                "MBAP length {} cannot hold a PDU",
                length
            )));
        }

        Ok(Self {
            transaction_id: u16::from_be_bytes([data[0], data[1]]),
            protocol_id,
            length,
            unit_id: data[6],
        })
    }

    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Number of PDU bytes following the header
    pub fn pdu_length(&self) -> usize {
        self.length as usize - 1
    }
}

/// Transaction id generator
///
/// Wraps around skipping zero.
#[derive(Debug, Clone)]
pub struct TransactionIds {
    next: u16,
}

impl TransactionIds {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        if self.next == 0 {
            self.next = 1;
        }
        id
    }
}

impl Default for TransactionIds {
    fn default() -> Self {
        Self::new()
    }
}
