//! Modbus function codes supported by the client

/// Function codes of the public Modbus data access functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
}

/// Bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

impl FunctionCode {
    pub fn value(&self) -> u8 {
        match self {
            FunctionCode::ReadCoils => 0x01,
            FunctionCode::ReadDiscreteInputs => 0x02,
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
            FunctionCode::WriteSingleCoil => 0x05,
            FunctionCode::WriteSingleRegister => 0x06,
            FunctionCode::WriteMultipleCoils => 0x0F,
            FunctionCode::WriteMultipleRegisters => 0x10,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(FunctionCode::ReadCoils),
            0x02 => Some(FunctionCode::ReadDiscreteInputs),
            0x03 => Some(FunctionCode::ReadHoldingRegisters),
            0x04 => Some(FunctionCode::ReadInputRegisters),
            0x05 => Some(FunctionCode::WriteSingleCoil),
            0x06 => Some(FunctionCode::WriteSingleRegister),
            0x0F => Some(FunctionCode::WriteMultipleCoils),
            0x10 => Some(FunctionCode::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// Check if the function reads data from the device
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::ReadHoldingRegisters
                | FunctionCode::ReadInputRegisters
        )
    }

    /// Check if the function transfers single bits rather than 16-bit registers
    pub fn is_bit_access(&self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::WriteSingleCoil
                | FunctionCode::WriteMultipleCoils
        )
    }

    /// Name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionCode::ReadCoils => "read_coils",
            FunctionCode::ReadDiscreteInputs => "read_discrete_inputs",
            FunctionCode::ReadHoldingRegisters => "read_holding_registers",
            FunctionCode::ReadInputRegisters => "read_input_registers",
            FunctionCode::WriteSingleCoil => "write_coil",
            FunctionCode::WriteSingleRegister => "write_register",
            FunctionCode::WriteMultipleCoils => "write_coils",
            FunctionCode::WriteMultipleRegisters => "write_registers",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_values() {
        assert_eq!(FunctionCode::ReadHoldingRegisters.value(), 0x03);
        assert_eq!(FunctionCode::from_u8(0x10), Some(FunctionCode::WriteMultipleRegisters));
        assert_eq!(FunctionCode::from_u8(0x83), None);
        assert!(FunctionCode::ReadCoils.is_read());
        assert!(FunctionCode::ReadCoils.is_bit_access());
        assert!(!FunctionCode::WriteSingleRegister.is_read());
    }
}
