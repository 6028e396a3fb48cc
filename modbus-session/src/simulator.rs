//! In-memory simulated device
//!
//! The simulator answers every request without touching real I/O. Its data
//! is deterministic:
//!
//! - With `echo_writes` enabled (the default), coil and holding register
//!   writes are stored, and reads of those tables return the stored values.
//!   Addresses that were never written read as the mock value.
//! - With `echo_writes` disabled, writes are acknowledged but discarded and
//!   every read returns the mock value.
//! - Input registers and discrete inputs are read-only and always return the
//!   mock value.
//!
//! Stored data survives open/close cycles of the link.

use crate::link::Link;
use crate::statistics::LinkStatistics;
use async_trait::async_trait;
use modbus_core::{ModbusError, ModbusResult, Operation, Request, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Simulator behaviour settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Store writes and return them on subsequent reads
    pub echo_writes: bool,
    /// Value returned for registers without stored data
    pub mock_register: u16,
    /// Value returned for coils without stored data
    pub mock_coil: bool,
    /// Artificial delay of every exchange, in milliseconds
    pub latency_ms: u64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            echo_writes: true,
            mock_register: 0,
            mock_coil: false,
            latency_ms: 0,
        }
    }
}

/// Simulated link
#[derive(Debug, Default)]
pub struct SimulatorLink {
    settings: SimulatorSettings,
    holding_registers: HashMap<u16, u16>,
    coils: HashMap<u16, bool>,
    open: bool,
    statistics: LinkStatistics,
}

impl SimulatorLink {
    pub fn new(settings: SimulatorSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    fn read_registers(&self, table: Option<&HashMap<u16, u16>>, address: u16, quantity: u16) -> Vec<u16> {
        (0..quantity)
            .map(|offset| {
                let addr = address.wrapping_add(offset);
                table
                    .and_then(|t| t.get(&addr).copied())
                    .unwrap_or(self.settings.mock_register)
            })
            .collect()
    }

    fn read_bits(&self, table: Option<&HashMap<u16, bool>>, address: u16, quantity: u16) -> Vec<bool> {
        (0..quantity)
            .map(|offset| {
                let addr = address.wrapping_add(offset);
                table
                    .and_then(|t| t.get(&addr).copied())
                    .unwrap_or(self.settings.mock_coil)
            })
            .collect()
    }

    fn apply(&mut self, request: &Request) -> Response {
        let address = request.address();
        let echo = self.settings.echo_writes;

        match request.operation() {
            Operation::ReadCoils { quantity } => {
                let table = echo.then_some(&self.coils);
                Response::Coils(self.read_bits(table, address, *quantity))
            }
            Operation::ReadDiscreteInputs { quantity } => {
                Response::DiscreteInputs(self.read_bits(None, address, *quantity))
            }
            Operation::ReadHoldingRegisters { quantity } => {
                let table = echo.then_some(&self.holding_registers);
                Response::HoldingRegisters(self.read_registers(table, address, *quantity))
            }
            Operation::ReadInputRegisters { quantity } => {
                Response::InputRegisters(self.read_registers(None, address, *quantity))
            }
            Operation::WriteSingleCoil { value } => {
                if echo {
                    self.coils.insert(address, *value);
                }
                Response::WriteSingleCoil {
                    address,
                    value: *value,
                }
            }
            Operation::WriteSingleRegister { value } => {
                if echo {
                    self.holding_registers.insert(address, *value);
                }
                Response::WriteSingleRegister {
                    address,
                    value: *value,
                }
            }
            Operation::WriteMultipleCoils { values } => {
                if echo {
                    for (offset, value) in values.iter().enumerate() {
                        self.coils.insert(address.wrapping_add(offset as u16), *value);
                    }
                }
                Response::WriteMultipleCoils {
                    address,
                    quantity: request.quantity(),
                }
            }
            Operation::WriteMultipleRegisters { values } => {
                if echo {
                    for (offset, value) in values.iter().enumerate() {
                        self.holding_registers
                            .insert(address.wrapping_add(offset as u16), *value);
                    }
                }
                Response::WriteMultipleRegisters {
                    address,
                    quantity: request.quantity(),
                }
            }
        }
    }
}

#[async_trait]
impl Link for SimulatorLink {
    async fn open(&mut self) -> ModbusResult<()> {
        self.open = true;
        self.statistics.increment_opens();
        log::debug!("simulator opened");
        Ok(())
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if self.open {
            self.open = false;
            self.statistics.increment_closes();
            log::debug!("simulator closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn exchange(&mut self, request: &Request) -> ModbusResult<Response> {
        if !self.open {
            let result = Err(ModbusError::connection("simulator link is not open"));
            self.statistics.record(&result);
            return result;
        }
        if self.settings.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.latency_ms)).await;
        }
        let result = Ok(self.apply(request));
        self.statistics.record(&result);
        result
    }

    fn statistics(&self) -> LinkStatistics {
        self.statistics.clone()
    }

    fn describe(&self) -> String {
        "simulator".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_simulator_echoes_writes() {
        let mut link = SimulatorLink::new(SimulatorSettings::default());
        assert_ok!(link.open().await);

        let write = Request::write_single_register(1, 100, 0xBEEF).unwrap();
        assert_ok!(link.exchange(&write).await);

        let read = Request::read_holding_registers(1, 99, 3).unwrap();
        let values = link.exchange(&read).await.unwrap().into_registers().unwrap();
        assert_eq!(values, vec![0, 0xBEEF, 0]);
    }

    #[tokio::test]
    async fn test_simulator_without_echo_returns_mock_value() {
        let mut link = SimulatorLink::new(SimulatorSettings {
            echo_writes: false,
            mock_register: 7,
            ..Default::default()
        });
        assert_ok!(link.open().await);

        let write = Request::write_multiple_registers(1, 10, vec![1, 2, 3]).unwrap();
        assert_eq!(
            link.exchange(&write).await.unwrap(),
            Response::WriteMultipleRegisters {
                address: 10,
                quantity: 3
            }
        );
        let read = Request::read_holding_registers(1, 10, 2).unwrap();
        assert_eq!(
            link.exchange(&read).await.unwrap(),
            Response::HoldingRegisters(vec![7, 7])
        );
    }

    #[tokio::test]
    async fn test_simulator_coils_and_read_only_tables() {
        let mut link = SimulatorLink::new(SimulatorSettings {
            mock_coil: true,
            mock_register: 5,
            ..Default::default()
        });
        assert_ok!(link.open().await);

        let write = Request::write_multiple_coils(1, 0, vec![false, false]).unwrap();
        assert_ok!(link.exchange(&write).await);
        let coils = Request::read_coils(1, 0, 3).unwrap();
        assert_eq!(
            link.exchange(&coils).await.unwrap(),
            Response::Coils(vec![false, false, true])
        );

        let inputs = Request::read_input_registers(1, 0, 1).unwrap();
        assert_eq!(
            link.exchange(&inputs).await.unwrap(),
            Response::InputRegisters(vec![5])
        );
    }

    #[tokio::test]
    async fn test_simulator_requires_open_and_keeps_data_across_reconnect() {
        let mut link = SimulatorLink::new(SimulatorSettings::default());
        let write = Request::write_single_coil(1, 3, true).unwrap();
        assert!(link.exchange(&write).await.is_err());

        assert_ok!(link.open().await);
        assert_ok!(link.exchange(&write).await);
        assert_ok!(link.close().await);
        assert_ok!(link.close().await);
        assert_ok!(link.open().await);

        let read = Request::read_coils(1, 3, 1).unwrap();
        assert_eq!(link.exchange(&read).await.unwrap(), Response::Coils(vec![true]));

        let stats = link.statistics();
        assert_eq!((stats.opens, stats.closes), (2, 1));
        assert_eq!((stats.exchanges, stats.failures), (3, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulator_latency() {
        let mut link = SimulatorLink::new(SimulatorSettings {
            latency_ms: 250,
            ..Default::default()
        });
        assert_ok!(link.open().await);
        let start = tokio::time::Instant::now();
        let read = Request::read_input_registers(1, 0, 1).unwrap();
        assert_ok!(link.exchange(&read).await);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn test_simulator_settings_deserialize_with_defaults() {
        let settings: SimulatorSettings =
            serde_json::from_str(r#"{ "mock_register": 42 }"#).unwrap();
        assert_eq!(settings.mock_register, 42);
        assert!(settings.echo_writes);
    }
}
