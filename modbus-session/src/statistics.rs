//! Link statistics collection

/// Link statistics
///
/// Counters kept by every [`Link`](crate::Link) implementation. They survive
/// open/close cycles, so `opens` and `closes` count the whole lifetime of the
/// link object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatistics {
    /// Number of successful open operations
    pub opens: u64,
    /// Number of close operations that released an open handle
    pub closes: u64,
    /// Number of exchanges attempted
    pub exchanges: u64,
    /// Number of exchanges that failed at transport or framing level
    pub failures: u64,
    /// Number of exception responses received
    pub exceptions: u64,
}

impl LinkStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_opens(&mut self) {
        self.opens += 1;
    }

    pub fn increment_closes(&mut self) {
        self.closes += 1;
    }

    pub fn increment_exchanges(&mut self) {
        self.exchanges += 1;
    }

    pub fn increment_failures(&mut self) {
        self.failures += 1;
    }

    pub fn increment_exceptions(&mut self) {
        self.exceptions += 1;
    }

    /// Record the outcome of one exchange
    pub fn record<T>(&mut self, result: &modbus_core::ModbusResult<T>) {
        self.increment_exchanges();
        match result {
            Ok(_) => {}
            Err(modbus_core::ModbusError::Protocol { .. }) => self.increment_exceptions(),
            Err(_) => self.increment_failures(),
        }
    }

    /// Get failure rate as a percentage of attempted exchanges
    pub fn failure_rate(&self) -> f64 {
        if self.exchanges == 0 {
            0.0
        } else {
            (self.failures as f64 / self.exchanges as f64) * 100.0
        }
    }
}
