//! CRC-16/MODBUS calculation for RTU frames

use modbus_core::{ModbusError, ModbusResult};

/// CRC calculation constants
const INITIAL_CRC: u16 = 0xFFFF;
const KEY: u16 = 0xA001; // Bit-reversed 8005

/// Precomputed CRC table
static CRC_TABLE: once_cell::sync::Lazy<[u16; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u16; 256];
    for b in 0..=0xFF {
        let mut v = b as u16;
        for _ in 0..8 {
            if (v & 1) == 1 {
                v = (v >> 1) ^ KEY;
            } else {
                v >>= 1;
            }
        }
        table[b as usize] = v;
    }
    table
});

/// CRC-16/MODBUS calculator
pub struct CrcCalc {
    crc_value: u16,
}

impl CrcCalc {
    pub fn new() -> Self {
        Self {
            crc_value: INITIAL_CRC,
        }
    }

    /// Update the CRC value with a single byte
    pub fn update(&mut self, data: u8) {
        self.crc_value =
            (self.crc_value >> 8) ^ CRC_TABLE[((self.crc_value ^ data as u16) & 0xFF) as usize];
    }

    /// Update the CRC value with multiple bytes
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// Get the current CRC value
    pub fn value(&self) -> u16 {
        self.crc_value
    }

    /// Get the CRC value as bytes in wire order (low byte first)
    pub fn crc_value_bytes(&self) -> [u8; 2] {
        self.crc_value.to_le_bytes()
    }
}

impl Default for CrcCalc {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the CRC of a byte slice
pub fn checksum(data: &[u8]) -> u16 {
    let mut calc = CrcCalc::new();
    calc.update_bytes(data);
    calc.value()
}

/// Validate a frame whose last two bytes are its CRC
pub fn validate(frame: &[u8]) -> ModbusResult<()> {
    if frame.len() < 3 {
        return Err(ModbusError::connection(format!(
            "RTU frame too short for CRC: {} bytes",
            frame.len()
        )));
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    let received = u16::from_le_bytes([tail[0], tail[1]]);
    let computed = checksum(body);
    if received != computed {
        return Err(ModbusError::connection(format!(
            "CRC mismatch: computed 0x{:04X}, received 0x{:04X}",
            computed, received
        )));
    }
    Ok(())
}
