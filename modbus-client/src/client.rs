//! Modbus client
//!
//! Every register operation funnels through [`ModbusClient::execute`]:
//!
//! 1. Take the exclusive slot (FIFO among concurrent callers of this client)
//! 2. Re-arm the idle timer, so an abandoned call still ends in a disconnect
//! 3. Open the link if needed
//! 4. Run the exchange under `execute_timeout`
//! 5. Sleep `after_execute_delay`, then re-arm the idle timer for
//!    `disconnect_timeout` and release the slot
//!
//! The idle timer has to take the same slot before it disconnects, so it
//! can never close the link under a running exchange. Clients are cheap to
//! clone; clones share the link, the slot and the timer.

use crate::config::{ClientBuilder, ClientConfig};
use crate::connection::{Connection, ConnectionState, StateCell};
use crate::logger::{ClientKind, ClientLog};
use crate::timer::IdleTimer;
use modbus_core::{
    DEFAULT_UNIT_ID, ErrorKind, ModbusError, ModbusResult, Request, Response,
};
use modbus_session::{Link, LinkStatistics};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// State guarded by the exclusive slot
struct Slot {
    connection: Connection,
    timer: IdleTimer,
}

struct Inner {
    config: ClientConfig,
    slot: Mutex<Slot>,
    state: Arc<StateCell>,
    log: ClientLog,
}

impl Inner {
    /// Idle timer expiry
    async fn idle_disconnect(&self, generation: u64) {
        let mut guard = self.slot.lock().await;
        let slot = &mut *guard;
        if !slot.timer.claim(generation) {
            return;
        }
        if slot.connection.state() == ConnectionState::Disconnected {
            return;
        }
        self.log.debug(format!(
            "Idle for {:?}, disconnecting",
            self.config.disconnect_timeout
        ));
        slot.connection.disconnect().await;
    }

    fn log_failure(&self, request: &Request, err: &ModbusError) {
        let message = format!(
            "{} failed (unit={}, address={}, quantity={}): {}",
            request.function().as_str(),
            request.unit_id(),
            request.address(),
            request.quantity(),
            err
        );
        match err.kind() {
            ErrorKind::Protocol | ErrorKind::Config => self.log.warning(message),
            ErrorKind::Connection | ErrorKind::Timeout => self.log.error(message),
        }
    }
}

/// Modbus client bound to one link
#[derive(Clone)]
pub struct ModbusClient {
    inner: Arc<Inner>,
}

impl ModbusClient {
    /// Create a client
    ///
    /// The link is not opened until the first request.
    ///
    /// # Errors
    /// Returns `ModbusError::Config` if the configuration is invalid
    pub fn new(config: ClientConfig) -> ModbusResult<Self> {
        config.validate()?;
        let link = config.link.build_link(config.execute_timeout);
        Ok(Self::from_parts(config, link))
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client over an already built link; `config.link` only selects the kind
    pub(crate) fn from_parts(config: ClientConfig, link: Box<dyn Link>) -> Self {
        let log = ClientLog::new(config.kind(), config.name_tag.as_deref());
        let connection = Connection::new(link, log.clone());
        let state = connection.state_cell();
        Self {
            inner: Arc::new(Inner {
                config,
                slot: Mutex::new(Slot {
                    connection,
                    timer: IdleTimer::new(),
                }),
                state,
                log,
            }),
        }
    }

    /// Connect, run `callback`, disconnect
    ///
    /// The link is closed whatever the callback returns.
    ///
    /// # Errors
    /// - `ModbusError::Config` if the configuration is invalid
    /// - `ModbusError::Connection` if the link cannot be opened; the callback
    ///   is not run in that case
    pub async fn temp_connect<F, Fut, T>(config: ClientConfig, callback: F) -> ModbusResult<T>
    where
        F: FnOnce(ModbusClient) -> Fut,
        Fut: Future<Output = T>,
    {
        let client = ModbusClient::new(config)?;
        client.connect().await?;
        let value = callback(client.clone()).await;
        client.disconnect().await;
        Ok(value)
    }

    /// Run one request through the exclusive slot
    ///
    /// # Errors
    /// - `ModbusError::Connection` if the link cannot be opened or fails
    ///   mid-exchange (the link is then dropped and reopened on next use)
    /// - `ModbusError::Timeout` if no response arrives within `execute_timeout`
    /// - `ModbusError::Protocol` if the device answers with an exception
    pub async fn execute(&self, request: Request) -> ModbusResult<Response> {
        let inner = &self.inner;
        let mut guard = inner.slot.lock().await;
        let slot = &mut *guard;
        // A caller dropped past this point must still end in an idle disconnect
        self.arm_idle_timer(&mut slot.timer);

        let result = match slot.connection.ensure_connected().await {
            Ok(()) => {
                slot.connection
                    .exchange(&request, inner.config.execute_timeout)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            inner.log_failure(&request, e);
        }

        if !inner.config.after_execute_delay.is_zero() {
            tokio::time::sleep(inner.config.after_execute_delay).await;
        }
        if slot.connection.state() == ConnectionState::Connected {
            self.arm_idle_timer(&mut slot.timer);
        } else {
            slot.timer.cancel();
        }
        result
    }

    /// Open the link now instead of on the first request
    pub async fn connect(&self) -> ModbusResult<()> {
        let mut guard = self.inner.slot.lock().await;
        let slot = &mut *guard;
        slot.timer.cancel();
        slot.connection.ensure_connected().await?;
        self.arm_idle_timer(&mut slot.timer);
        Ok(())
    }

    /// Close the link now
    ///
    /// Waits for a running request to finish. Close failures are logged.
    pub async fn disconnect(&self) {
        let mut guard = self.inner.slot.lock().await;
        let slot = &mut *guard;
        slot.timer.cancel();
        slot.connection.disconnect().await;
    }

    fn arm_idle_timer(&self, timer: &mut IdleTimer) {
        let weak = Arc::downgrade(&self.inner);
        timer.arm(self.inner.config.disconnect_timeout, move |generation| async move {
            if let Some(inner) = weak.upgrade() {
                inner.idle_disconnect(generation).await;
            }
        });
    }

    fn checked(&self, request: ModbusResult<Request>) -> ModbusResult<Request> {
        request.inspect_err(|e| self.inner.log.warning(format!("Rejected request: {}", e)))
    }

    fn check_count(&self, what: &str, expected: u16, received: usize) {
        if received != expected as usize {
            self.inner.log.warning(format!(
                "Expected {} {}, got {}",
                expected, what, received
            ));
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.load()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn name_tag(&self) -> Option<&str> {
        self.inner.config.name_tag.as_deref()
    }

    pub fn kind(&self) -> ClientKind {
        self.inner.log.kind()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Link counters; waits for a running request to finish
    pub async fn statistics(&self) -> LinkStatistics {
        self.inner.slot.lock().await.connection.statistics()
    }

    /// Read coils (function 0x01) from the default unit
    pub async fn read_coils(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        self.read_coils_from(DEFAULT_UNIT_ID, address, count).await
    }

    pub async fn read_coils_from(
        &self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        let request = self.checked(Request::read_coils(unit_id, address, count))?;
        let values = self.execute(request).await?.into_bits()?;
        self.check_count("coils", count, values.len());
        Ok(values)
    }

    /// Read discrete inputs (function 0x02) from the default unit
    pub async fn read_discrete_inputs(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        self.read_discrete_inputs_from(DEFAULT_UNIT_ID, address, count)
            .await
    }

    pub async fn read_discrete_inputs_from(
        &self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        let request = self.checked(Request::read_discrete_inputs(unit_id, address, count))?;
        let values = self.execute(request).await?.into_bits()?;
        self.check_count("discrete inputs", count, values.len());
        Ok(values)
    }

    /// Read holding registers (function 0x03) from the default unit
    pub async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.read_holding_registers_from(DEFAULT_UNIT_ID, address, count)
            .await
    }

    pub async fn read_holding_registers_from(
        &self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        let request = self.checked(Request::read_holding_registers(unit_id, address, count))?;
        let values = self.execute(request).await?.into_registers()?;
        self.check_count("registers", count, values.len());
        Ok(values)
    }

    /// Read input registers (function 0x04) from the default unit
    pub async fn read_input_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.read_input_registers_from(DEFAULT_UNIT_ID, address, count)
            .await
    }

    pub async fn read_input_registers_from(
        &self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        let request = self.checked(Request::read_input_registers(unit_id, address, count))?;
        let values = self.execute(request).await?.into_registers()?;
        self.check_count("registers", count, values.len());
        Ok(values)
    }

    /// Write a single coil (function 0x05) on the default unit
    pub async fn write_coil(&self, address: u16, value: bool) -> ModbusResult<()> {
        self.write_coil_from(DEFAULT_UNIT_ID, address, value).await
    }

    pub async fn write_coil_from(&self, unit_id: u8, address: u16, value: bool) -> ModbusResult<()> {
        let request = self.checked(Request::write_single_coil(unit_id, address, value))?;
        self.execute(request).await?.into_write_ack()
    }

    /// Write a single holding register (function 0x06) on the default unit
    pub async fn write_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        self.write_register_from(DEFAULT_UNIT_ID, address, value)
            .await
    }

    pub async fn write_register_from(
        &self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> ModbusResult<()> {
        let request = self.checked(Request::write_single_register(unit_id, address, value))?;
        self.execute(request).await?.into_write_ack()
    }

    /// Write consecutive coils (function 0x0F) on the default unit
    pub async fn write_coils(&self, address: u16, values: &[bool]) -> ModbusResult<()> {
        self.write_coils_from(DEFAULT_UNIT_ID, address, values).await
    }

    pub async fn write_coils_from(
        &self,
        unit_id: u8,
        address: u16,
        values: &[bool],
    ) -> ModbusResult<()> {
        let request =
            self.checked(Request::write_multiple_coils(unit_id, address, values.to_vec()))?;
        self.execute(request).await?.into_write_ack()
    }

    /// Write consecutive holding registers (function 0x10) on the default unit
    pub async fn write_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        self.write_registers_from(DEFAULT_UNIT_ID, address, values)
            .await
    }

    pub async fn write_registers_from(
        &self,
        unit_id: u8,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        let request =
            self.checked(Request::write_multiple_registers(unit_id, address, values.to_vec()))?;
        self.execute(request).await?.into_write_ack()
    }
}

impl fmt::Debug for ModbusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusClient")
            .field("kind", &self.kind())
            .field("name_tag", &self.name_tag())
            .field("state", &self.state())
            .finish()
    }
}
