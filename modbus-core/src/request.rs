//! Request and response model
//!
//! A [`Request`] describes exactly one protocol exchange. It is validated on
//! construction, so a request that reaches a link is always encodable.

use crate::error::{ModbusError, ModbusResult};
use crate::function::FunctionCode;

/// Unit id used when a caller does not name one
pub const DEFAULT_UNIT_ID: u8 = 1;

/// Quantity limits from the Modbus application protocol
pub const MAX_READ_BITS: u16 = 2000;
pub const MAX_READ_REGISTERS: u16 = 125;
pub const MAX_WRITE_BITS: u16 = 1968;
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Operation kind and its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ReadCoils { quantity: u16 },
    ReadDiscreteInputs { quantity: u16 },
    ReadHoldingRegisters { quantity: u16 },
    ReadInputRegisters { quantity: u16 },
    WriteSingleCoil { value: bool },
    WriteSingleRegister { value: u16 },
    WriteMultipleCoils { values: Vec<bool> },
    WriteMultipleRegisters { values: Vec<u16> },
}

impl Operation {
    pub fn function(&self) -> FunctionCode {
        match self {
            Operation::ReadCoils { .. } => FunctionCode::ReadCoils,
            Operation::ReadDiscreteInputs { .. } => FunctionCode::ReadDiscreteInputs,
            Operation::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            Operation::ReadInputRegisters { .. } => FunctionCode::ReadInputRegisters,
            Operation::WriteSingleCoil { .. } => FunctionCode::WriteSingleCoil,
            Operation::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            Operation::WriteMultipleCoils { .. } => FunctionCode::WriteMultipleCoils,
            Operation::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Number of coils or registers addressed by the operation
    pub fn quantity(&self) -> u16 {
        match self {
            Operation::ReadCoils { quantity }
            | Operation::ReadDiscreteInputs { quantity }
            | Operation::ReadHoldingRegisters { quantity }
            | Operation::ReadInputRegisters { quantity } => *quantity,
            Operation::WriteSingleCoil { .. } | Operation::WriteSingleRegister { .. } => 1,
            Operation::WriteMultipleCoils { values } => values.len().min(u16::MAX as usize) as u16,
            Operation::WriteMultipleRegisters { values } => {
                values.len().min(u16::MAX as usize) as u16
            }
        }
    }

    fn quantity_limit(&self) -> u16 {
        match self {
            Operation::ReadCoils { .. } | Operation::ReadDiscreteInputs { .. } => MAX_READ_BITS,
            Operation::ReadHoldingRegisters { .. } | Operation::ReadInputRegisters { .. } => {
                MAX_READ_REGISTERS
            }
            Operation::WriteSingleCoil { .. } | Operation::WriteSingleRegister { .. } => 1,
            Operation::WriteMultipleCoils { .. } => MAX_WRITE_BITS,
            Operation::WriteMultipleRegisters { .. } => MAX_WRITE_REGISTERS,
        }
    }
}

/// A single Modbus request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    unit_id: u8,
    address: u16,
    operation: Operation,
}

impl Request {
    /// Create a validated request
    ///
    /// # Errors
    /// Returns `ModbusError::Config` if the quantity is zero, exceeds the
    /// protocol limit of the function, or if the addressed range runs past
    /// address 65535.
    pub fn new(unit_id: u8, address: u16, operation: Operation) -> ModbusResult<Self> {
        let function = operation.function();
        let limit = operation.quantity_limit();
        let quantity = match &operation {
            Operation::WriteMultipleCoils { values } => values.len(),
            Operation::WriteMultipleRegisters { values } => values.len(),
            other => other.quantity() as usize,
        };

        if quantity == 0 || quantity > limit as usize {
            return Err(ModbusError::config(format!(
                "{}: quantity must be in 1..={}, got {}",
                function.as_str(),
                limit,
                quantity
            )));
        }
        if address as usize + quantity > u16::MAX as usize + 1 {
            return Err(ModbusError::config(format!(
                "{}: address range {}+{} exceeds 65535",
                function.as_str(),
                address,
                quantity
            )));
        }

        Ok(Self {
            unit_id,
            address,
            operation,
        })
    }

    pub fn read_coils(unit_id: u8, address: u16, quantity: u16) -> ModbusResult<Self> {
        Self::new(unit_id, address, Operation::ReadCoils { quantity })
    }

    pub fn read_discrete_inputs(unit_id: u8, address: u16, quantity: u16) -> ModbusResult<Self> {
        Self::new(unit_id, address, Operation::ReadDiscreteInputs { quantity })
    }

    pub fn read_holding_registers(unit_id: u8, address: u16, quantity: u16) -> ModbusResult<Self> {
        Self::new(unit_id, address, Operation::ReadHoldingRegisters { quantity })
    }

    pub fn read_input_registers(unit_id: u8, address: u16, quantity: u16) -> ModbusResult<Self> {
        Self::new(unit_id, address, Operation::ReadInputRegisters { quantity })
    }

    pub fn write_single_coil(unit_id: u8, address: u16, value: bool) -> ModbusResult<Self> {
        Self::new(unit_id, address, Operation::WriteSingleCoil { value })
    }

    pub fn write_single_register(unit_id: u8, address: u16, value: u16) -> ModbusResult<Self> {
        Self::new(unit_id, address, Operation::WriteSingleRegister { value })
    }

    pub fn write_multiple_coils(unit_id: u8, address: u16, values: Vec<bool>) -> ModbusResult<Self> {
        Self::new(unit_id, address, Operation::WriteMultipleCoils { values })
    }

    pub fn write_multiple_registers(
        unit_id: u8,
        address: u16,
        values: Vec<u16>,
    ) -> ModbusResult<Self> {
        Self::new(unit_id, address, Operation::WriteMultipleRegisters { values })
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn function(&self) -> FunctionCode {
        self.operation.function()
    }

    pub fn quantity(&self) -> u16 {
        self.operation.quantity()
    }
}

/// Decoded response of a successful exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Coils(Vec<bool>),
    DiscreteInputs(Vec<bool>),
    HoldingRegisters(Vec<u16>),
    InputRegisters(Vec<u16>),
    /// Echo of a single coil write
    WriteSingleCoil { address: u16, value: bool },
    /// Echo of a single register write
    WriteSingleRegister { address: u16, value: u16 },
    /// Acknowledgement of a multiple coil write
    WriteMultipleCoils { address: u16, quantity: u16 },
    /// Acknowledgement of a multiple register write
    WriteMultipleRegisters { address: u16, quantity: u16 },
}

impl Response {
    pub fn function(&self) -> FunctionCode {
        match self {
            Response::Coils(_) => FunctionCode::ReadCoils,
            Response::DiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Response::HoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Response::InputRegisters(_) => FunctionCode::ReadInputRegisters,
            Response::WriteSingleCoil { .. } => FunctionCode::WriteSingleCoil,
            Response::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            Response::WriteMultipleCoils { .. } => FunctionCode::WriteMultipleCoils,
            Response::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Extract register values from a register read response
    pub fn into_registers(self) -> ModbusResult<Vec<u16>> {
        match self {
            Response::HoldingRegisters(values) | Response::InputRegisters(values) => Ok(values),
            other => Err(ModbusError::connection(format!(
                "expected a register response, got {}",
                other.function().as_str()
            ))),
        }
    }

    /// Extract bit values from a coil or discrete input read response
    pub fn into_bits(self) -> ModbusResult<Vec<bool>> {
        match self {
            Response::Coils(values) | Response::DiscreteInputs(values) => Ok(values),
            other => Err(ModbusError::connection(format!(
                "expected a bit response, got {}",
                other.function().as_str()
            ))),
        }
    }

    /// Check that the response acknowledges a write
    pub fn into_write_ack(self) -> ModbusResult<()> {
        match self {
            Response::WriteSingleCoil { .. }
            | Response::WriteSingleRegister { .. }
            | Response::WriteMultipleCoils { .. }
            | Response::WriteMultipleRegisters { .. } => Ok(()),
            other => Err(ModbusError::connection(format!(
                "expected a write acknowledgement, got {}",
                other.function().as_str()
            ))),
        }
    }
}
