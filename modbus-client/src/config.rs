//! Client configuration and builder
//!
//! A [`ClientConfig`] is fixed at construction: the link kind with its
//! parameters, the three timing values and a name tag used in log lines.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use modbus_client::ClientBuilder;
//! use std::time::Duration;
//!
//! // TCP device
//! let config = ClientBuilder::new()
//!     .tcp("192.168.1.100", 502)
//!     .disconnect_timeout(Duration::from_secs(30))
//!     .build_config()?;
//!
//! // RTU device on a serial line
//! let config = ClientBuilder::new()
//!     .serial("/dev/ttyUSB0", 19200)
//!     .name_tag("meter")
//!     .build_config()?;
//! # Ok::<(), modbus_core::ModbusError>(())
//! ```

use crate::client::ModbusClient;
use crate::logger::ClientKind;
use modbus_core::{ModbusError, ModbusResult};
use modbus_session::{Link, RtuLink, SimulatorLink, SimulatorSettings, TcpLink};
use modbus_transport::{SerialSettings, SerialTransport, TcpSettings, TcpTransport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default deadline of one exchange
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default idle period before the link is closed
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(20);
/// Default pause after each exchange
pub const DEFAULT_AFTER_EXECUTE_DELAY: Duration = Duration::from_millis(3);
/// Default baud rate of serial links
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial line parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    #[serde(rename = "N", alias = "none")]
    None,
    #[serde(rename = "E", alias = "even")]
    Even,
    #[serde(rename = "O", alias = "odd")]
    Odd,
}

/// Serial line parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialParams {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub path: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    2
}

impl SerialParams {
    /// Parameters for `path` at `baud_rate`, 8 data bits, 2 stop bits, no parity
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::None,
        }
    }

    fn validate(&self) -> ModbusResult<()> {
        if self.path.trim().is_empty() {
            return Err(ModbusError::config("Serial device path is empty"));
        }
        if self.baud_rate == 0 {
            return Err(ModbusError::config("Serial baud rate must be positive"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(ModbusError::config(format!(
                "Unsupported number of data bits: {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(ModbusError::config(format!(
                "Unsupported number of stop bits: {}",
                self.stop_bits
            )));
        }
        Ok(())
    }

    fn to_settings(&self) -> SerialSettings {
        let mut settings = SerialSettings::new(self.path.clone(), self.baud_rate);
        settings.data_bits = match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        settings.stop_bits = match self.stop_bits {
            1 => tokio_serial::StopBits::One,
            _ => tokio_serial::StopBits::Two,
        };
        settings.parity = match self.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        };
        settings
    }
}

/// Link kind with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkConfig {
    /// Modbus TCP (MBAP framing)
    Tcp { host: String, port: u16 },
    /// Modbus RTU over a serial line
    Serial(SerialParams),
    /// In-memory simulated device
    Simulator(SimulatorSettings),
}

impl LinkConfig {
    pub fn kind(&self) -> ClientKind {
        match self {
            LinkConfig::Tcp { .. } => ClientKind::Tcp,
            LinkConfig::Serial(_) => ClientKind::Serial,
            LinkConfig::Simulator(_) => ClientKind::Simulator,
        }
    }

    fn validate(&self) -> ModbusResult<()> {
        match self {
            LinkConfig::Tcp { host, port } => {
                if host.trim().is_empty() {
                    return Err(ModbusError::config("TCP host is empty"));
                }
                if *port == 0 {
                    return Err(ModbusError::config("TCP port must not be 0"));
                }
                Ok(())
            }
            LinkConfig::Serial(params) => params.validate(),
            LinkConfig::Simulator(_) => Ok(()),
        }
    }

    /// Build the link backend
    ///
    /// Nothing is opened here; the client opens the link on first use.
    /// `connect_timeout` bounds the TCP connect.
    pub(crate) fn build_link(&self, connect_timeout: Duration) -> Box<dyn Link> {
        match self {
            LinkConfig::Tcp { host, port } => {
                let settings = TcpSettings::with_timeout(host.clone(), *port, connect_timeout);
                Box::new(TcpLink::new(TcpTransport::new(settings)))
            }
            LinkConfig::Serial(params) => {
                Box::new(RtuLink::new(SerialTransport::new(params.to_settings())))
            }
            LinkConfig::Simulator(settings) => Box::new(SimulatorLink::new(settings.clone())),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub link: LinkConfig,
    /// Deadline of one exchange
    #[serde(
        rename = "execute_timeout_ms",
        with = "duration_ms",
        default = "default_execute_timeout"
    )]
    pub execute_timeout: Duration,
    /// Idle period after which the link is closed
    #[serde(
        rename = "disconnect_timeout_ms",
        with = "duration_ms",
        default = "default_disconnect_timeout"
    )]
    pub disconnect_timeout: Duration,
    /// Pause after each exchange before the next request may start
    #[serde(
        rename = "after_execute_delay_ms",
        with = "duration_ms",
        default = "default_after_execute_delay"
    )]
    pub after_execute_delay: Duration,
    /// Label appended to log lines
    #[serde(default)]
    pub name_tag: Option<String>,
}

fn default_execute_timeout() -> Duration {
    DEFAULT_EXECUTE_TIMEOUT
}

fn default_disconnect_timeout() -> Duration {
    DEFAULT_DISCONNECT_TIMEOUT
}

fn default_after_execute_delay() -> Duration {
    DEFAULT_AFTER_EXECUTE_DELAY
}

impl ClientConfig {
    /// Configuration for `link` with default timing
    pub fn new(link: LinkConfig) -> Self {
        Self {
            link,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
            after_execute_delay: DEFAULT_AFTER_EXECUTE_DELAY,
            name_tag: None,
        }
    }

    /// Check the configuration before any I/O
    ///
    /// # Errors
    /// Returns `ModbusError::Config` if the link parameters are malformed or
    /// if `disconnect_timeout` is shorter than `execute_timeout`
    pub fn validate(&self) -> ModbusResult<()> {
        self.link.validate()?;
        if self.disconnect_timeout < self.execute_timeout {
            return Err(ModbusError::config(format!(
                "disconnect timeout ({:?}) is shorter than execute timeout ({:?})",
                self.disconnect_timeout, self.execute_timeout
            )));
        }
        Ok(())
    }

    pub fn kind(&self) -> ClientKind {
        self.link.kind()
    }
}

/// Timing fields as integer milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Client builder
///
/// # Configuration Flow
/// 1. Create builder with `ClientBuilder::new()` or `ModbusClient::builder()`
/// 2. Pick the link (`tcp`, `serial`, `serial_params` or `simulator`)
/// 3. Adjust timing and the name tag
/// 4. Build with `build()` (client) or `build_config()` (configuration only)
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    link: Option<LinkConfig>,
    execute_timeout: Duration,
    disconnect_timeout: Duration,
    after_execute_delay: Duration,
    name_tag: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with default timing
    ///
    /// # Default Settings
    /// - Execute timeout: 5 s
    /// - Disconnect timeout: 20 s
    /// - After execute delay: 3 ms
    pub fn new() -> Self {
        Self {
            link: None,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
            after_execute_delay: DEFAULT_AFTER_EXECUTE_DELAY,
            name_tag: None,
        }
    }

    /// Configure a Modbus TCP link
    pub fn tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.link = Some(LinkConfig::Tcp {
            host: host.into(),
            port,
        });
        self
    }

    /// Configure a Modbus RTU link with default line parameters
    pub fn serial(self, path: impl Into<String>, baud_rate: u32) -> Self {
        self.serial_params(SerialParams::new(path, baud_rate))
    }

    /// Configure a Modbus RTU link with explicit line parameters
    pub fn serial_params(mut self, params: SerialParams) -> Self {
        self.link = Some(LinkConfig::Serial(params));
        self
    }

    /// Configure a simulated device
    pub fn simulator(mut self, settings: SimulatorSettings) -> Self {
        self.link = Some(LinkConfig::Simulator(settings));
        self
    }

    pub fn execute_timeout(mut self, timeout: Duration) -> Self {
        self.execute_timeout = timeout;
        self
    }

    pub fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    pub fn after_execute_delay(mut self, delay: Duration) -> Self {
        self.after_execute_delay = delay;
        self
    }

    pub fn name_tag(mut self, tag: impl Into<String>) -> Self {
        self.name_tag = Some(tag.into());
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// Returns `ModbusError::Config` if no link was configured or the
    /// configuration is invalid (see [`ClientConfig::validate`])
    pub fn build_config(self) -> ModbusResult<ClientConfig> {
        let link = self
            .link
            .ok_or_else(|| ModbusError::config("No link configured (use tcp, serial or simulator)"))?;
        let config = ClientConfig {
            link,
            execute_timeout: self.execute_timeout,
            disconnect_timeout: self.disconnect_timeout,
            after_execute_delay: self.after_execute_delay,
            name_tag: self.name_tag,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the client
    ///
    /// The link is not opened until the first request.
    pub fn build(self) -> ModbusResult<ModbusClient> {
        ModbusClient::new(self.build_config()?)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbus_core::ErrorKind;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_builder_defaults() {
        let config = assert_ok!(ClientBuilder::new().tcp("10.0.0.5", 502).build_config());
        assert_eq!(config.execute_timeout, Duration::from_secs(5));
        assert_eq!(config.disconnect_timeout, Duration::from_secs(20));
        assert_eq!(config.after_execute_delay, Duration::from_millis(3));
        assert_eq!(config.name_tag, None);
        assert_eq!(config.kind(), ClientKind::Tcp);
    }

    #[test]
    fn test_serial_defaults() {
        let config = assert_ok!(ClientBuilder::new().serial("/dev/ttyUSB0", 19200).build_config());
        let LinkConfig::Serial(params) = &config.link else {
            panic!("expected serial link, got {:?}", config.link);
        };
        assert_eq!(params.baud_rate, 19200);
        assert_eq!((params.data_bits, params.stop_bits), (8, 2));
        assert_eq!(params.parity, Parity::None);

        let settings = params.to_settings();
        assert_eq!(settings.stop_bits, tokio_serial::StopBits::Two);
        assert_eq!(settings.parity, tokio_serial::Parity::None);
    }

    #[test]
    fn test_builder_rejects_invalid_configuration() {
        let err = assert_err!(ClientBuilder::new().build_config());
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = assert_err!(ClientBuilder::new().tcp("", 502).build_config());
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = assert_err!(ClientBuilder::new().tcp("plc", 0).build_config());
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = assert_err!(ClientBuilder::new().serial("  ", 9600).build_config());
        assert_eq!(err.kind(), ErrorKind::Config);

        let mut params = SerialParams::new("/dev/ttyS0", 9600);
        params.stop_bits = 3;
        let err = assert_err!(ClientBuilder::new().serial_params(params).build_config());
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = assert_err!(
            ClientBuilder::new()
                .simulator(SimulatorSettings::default())
                .execute_timeout(Duration::from_secs(10))
                .disconnect_timeout(Duration::from_secs(2))
                .build_config()
        );
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_equal_timeouts_are_accepted() {
        assert_ok!(
            ClientBuilder::new()
                .simulator(SimulatorSettings::default())
                .execute_timeout(Duration::from_secs(2))
                .disconnect_timeout(Duration::from_secs(2))
                .after_execute_delay(Duration::ZERO)
                .build_config()
        );
    }

    #[test]
    fn test_config_serializes_timing_as_milliseconds() {
        let config = assert_ok!(
            ClientBuilder::new()
                .tcp("plc.local", 1502)
                .execute_timeout(Duration::from_millis(1500))
                .name_tag("line-2")
                .build_config()
        );
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["execute_timeout_ms"], 1500);
        assert_eq!(json["disconnect_timeout_ms"], 20000);
        assert_eq!(json["after_execute_delay_ms"], 3);
        assert_eq!(json["link"]["kind"], "tcp");
        assert_eq!(json["link"]["port"], 1502);

        let back: ClientConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_deserialize_fills_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{ "link": { "kind": "serial", "path": "COM3", "parity": "E" } }"#,
        )
        .unwrap();
        assert_eq!(
            config.link,
            LinkConfig::Serial(SerialParams {
                path: "COM3".to_string(),
                baud_rate: 9600,
                data_bits: 8,
                stop_bits: 2,
                parity: Parity::Even,
            })
        );
        assert_eq!(config.execute_timeout, DEFAULT_EXECUTE_TIMEOUT);
        assert_ok!(config.validate());

        let simulated: ClientConfig =
            serde_json::from_str(r#"{ "link": { "kind": "simulator", "mock_register": 9 } }"#)
                .unwrap();
        assert_eq!(simulated.kind(), ClientKind::Simulator);
    }
}
