//! Connection state machine
//!
//! A [`Connection`] owns the link of one client and its
//! [`ConnectionState`]. It is only ever touched by the holder of the
//! client's exclusive slot, so opening, exchanging and closing never overlap.

use crate::logger::ClientLog;
use modbus_core::{ModbusError, ModbusResult, Request, Response};
use modbus_session::{Link, LinkStatistics};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

/// Connection state
///
/// # State Transitions
/// ```text
/// Disconnected -> Connecting     (ensure_connected)
/// Connecting -> Connected        (link opened)
/// Connecting -> Disconnected     (open failed)
/// Connected -> Disconnecting     (disconnect, idle timeout or broken link)
/// Disconnecting -> Disconnected  (link closed, close errors are only logged)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link handle is held (initial state)
    #[default]
    Disconnected,
    /// The link is being opened
    Connecting,
    /// The link is open and ready for exchanges
    Connected,
    /// The link is being closed
    Disconnecting,
}

impl ConnectionState {
    /// Validate state transition
    ///
    /// # Arguments
    /// * `new_state` - The target state
    ///
    /// # Returns
    /// `Ok(())` if transition is valid, `Err` otherwise
    pub fn validate_transition(&self, new_state: ConnectionState) -> ModbusResult<()> {
        let valid = matches!(
            (*self, new_state),
            (ConnectionState::Disconnected, ConnectionState::Connecting)
                | (ConnectionState::Connecting, ConnectionState::Connected)
                | (ConnectionState::Connecting, ConnectionState::Disconnected)
                | (ConnectionState::Connected, ConnectionState::Disconnecting)
                | (ConnectionState::Disconnecting, ConnectionState::Disconnected)
        );

        if valid {
            Ok(())
        } else {
            Err(ModbusError::connection(format!(
                "Invalid state transition: {:?} -> {:?}",
                self, new_state
            )))
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Disconnecting => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State readable without taking the slot
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: ConnectionState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

/// Link plus its lifecycle state
pub(crate) struct Connection {
    link: Box<dyn Link>,
    state: Arc<StateCell>,
    /// Set while an exchange runs; still set if the caller was dropped mid-exchange
    exchange_pending: bool,
    log: ClientLog,
}

impl Connection {
    pub(crate) fn new(link: Box<dyn Link>, log: ClientLog) -> Self {
        Self {
            link,
            state: Arc::new(StateCell::default()),
            exchange_pending: false,
            log,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.load()
    }

    pub(crate) fn state_cell(&self) -> Arc<StateCell> {
        self.state.clone()
    }

    pub(crate) fn statistics(&self) -> LinkStatistics {
        self.link.statistics()
    }

    fn transition(&mut self, new_state: ConnectionState) {
        let current = self.state();
        if let Err(e) = current.validate_transition(new_state) {
            self.log.warning(e.to_string());
        }
        self.state.store(new_state);
    }

    /// Open the link unless it is already connected
    ///
    /// A link left in an unknown state (closed underneath us, or abandoned
    /// in the middle of an exchange) is closed and reopened.
    ///
    /// # Errors
    /// Returns `ModbusError::Connection` if the link cannot be opened
    pub(crate) async fn ensure_connected(&mut self) -> ModbusResult<()> {
        match self.state() {
            ConnectionState::Connected if !self.exchange_pending && self.link.is_open() => {
                return Ok(());
            }
            ConnectionState::Connected => {
                self.close_link("Link left in an unknown state").await;
            }
            ConnectionState::Disconnected => {}
            _ => self.reset_abandoned().await,
        }

        self.transition(ConnectionState::Connecting);
        self.log.debug(format!("Connecting to {}", self.link.describe()));

        match self.link.open().await {
            Ok(()) => {
                self.transition(ConnectionState::Connected);
                self.log.info(format!("Connected to {}", self.link.describe()));
                Ok(())
            }
            Err(e) => {
                self.transition(ConnectionState::Disconnected);
                let err = match e {
                    ModbusError::Connection(_) => e,
                    other => ModbusError::connection(other.to_string()),
                };
                self.log.error(format!(
                    "Failed to connect to {}: {}",
                    self.link.describe(),
                    err
                ));
                Err(err)
            }
        }
    }

    /// Run one exchange bounded by `deadline`
    ///
    /// Timeouts and transport failures leave the link in an unknown state;
    /// it is closed and the state drops to `Disconnected`. Exception
    /// responses keep the connection.
    pub(crate) async fn exchange(
        &mut self,
        request: &Request,
        deadline: Duration,
    ) -> ModbusResult<Response> {
        self.exchange_pending = true;
        let outcome = tokio::time::timeout(deadline, self.link.exchange(request)).await;
        self.exchange_pending = false;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(ModbusError::timeout(format!(
                "No response from {} within {:?}",
                self.link.describe(),
                deadline
            ))),
        };

        if let Err(e) = &result {
            if e.requires_reconnect() {
                self.close_link(&format!("Dropping link after failure: {}", e))
                    .await;
            }
        }
        result
    }

    /// Close the link if it is not already disconnected
    pub(crate) async fn disconnect(&mut self) {
        match self.state() {
            ConnectionState::Disconnected => {}
            ConnectionState::Connected => self.close_link("Disconnecting").await,
            _ => self.reset_abandoned().await,
        }
    }

    /// Recover from an open or close whose caller was cancelled half-way
    async fn reset_abandoned(&mut self) {
        self.log.debug(format!(
            "Resetting link abandoned while {}",
            self.state()
        ));
        if let Err(e) = self.link.close().await {
            self.log.debug(format!("Close of abandoned link failed: {}", e));
        }
        self.exchange_pending = false;
        self.state.store(ConnectionState::Disconnected);
    }

    async fn close_link(&mut self, reason: &str) {
        self.log.debug(reason);
        self.transition(ConnectionState::Disconnecting);
        if let Err(e) = self.link.close().await {
            self.log
                .warning(format!("Error while closing {}: {}", self.link.describe(), e));
        }
        self.exchange_pending = false;
        self.transition(ConnectionState::Disconnected);
        self.log
            .info(format!("Disconnected from {}", self.link.describe()));
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("link", &self.link.describe())
            .field("state", &self.state())
            .field("exchange_pending", &self.exchange_pending)
            .finish()
    }
}
