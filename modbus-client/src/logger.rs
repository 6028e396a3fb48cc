//! Logging hook
//!
//! Every client kind (TCP, serial, simulator) has one process-wide sink.
//! All instances of a kind share it, and replacing it takes effect for the
//! next message logged by any of them. The sink is resolved at each call, so
//! messages already being written are not affected.
//!
//! The default sink is [`StderrLogger`]. [`LogFacadeLogger`] forwards to the
//! `log` crate for applications that install a `log` backend.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Sink for client log messages
pub trait ClientLogger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Client kind, the scope of a logger override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Tcp,
    Serial,
    Simulator,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::Tcp => "tcp",
            ClientKind::Serial => "serial",
            ClientKind::Simulator => "simulator",
        }
    }

    /// Name used as the prefix of log lines
    pub fn class_name(&self) -> &'static str {
        match self {
            ClientKind::Tcp => "ModbusTcpClient",
            ClientKind::Serial => "ModbusSerialClient",
            ClientKind::Simulator => "ModbusSimulatorClient",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default sink: warnings and errors go to stderr, debug and info are dropped
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl ClientLogger for StderrLogger {
    fn debug(&self, _message: &str) {}

    fn info(&self, _message: &str) {}

    fn warning(&self, message: &str) {
        eprintln!("WARNING {}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("ERROR {}", message);
    }
}

/// Sink forwarding every level to the `log` facade
///
/// Records use the target `modbus_client::<kind>`.
#[derive(Debug, Clone, Copy)]
pub struct LogFacadeLogger {
    target: &'static str,
}

impl LogFacadeLogger {
    pub fn new(kind: ClientKind) -> Self {
        let target = match kind {
            ClientKind::Tcp => "modbus_client::tcp",
            ClientKind::Serial => "modbus_client::serial",
            ClientKind::Simulator => "modbus_client::simulator",
        };
        Self { target }
    }
}

impl ClientLogger for LogFacadeLogger {
    fn debug(&self, message: &str) {
        log::debug!(target: self.target, "{}", message);
    }

    fn info(&self, message: &str) {
        log::info!(target: self.target, "{}", message);
    }

    fn warning(&self, message: &str) {
        log::warn!(target: self.target, "{}", message);
    }

    fn error(&self, message: &str) {
        log::error!(target: self.target, "{}", message);
    }
}

static DEFAULT_LOGGER: Lazy<Arc<dyn ClientLogger>> = Lazy::new(|| Arc::new(StderrLogger));

static LOGGERS: Lazy<RwLock<HashMap<ClientKind, Arc<dyn ClientLogger>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Replace the sink of every client of `kind`
pub fn set_logger(kind: ClientKind, logger: Arc<dyn ClientLogger>) {
    let mut loggers = LOGGERS.write().unwrap_or_else(|e| e.into_inner());
    loggers.insert(kind, logger);
}

/// Restore the default sink for `kind`
pub fn reset_logger(kind: ClientKind) {
    let mut loggers = LOGGERS.write().unwrap_or_else(|e| e.into_inner());
    loggers.remove(&kind);
}

/// Current sink for `kind`
pub fn logger(kind: ClientKind) -> Arc<dyn ClientLogger> {
    let loggers = LOGGERS.read().unwrap_or_else(|e| e.into_inner());
    loggers
        .get(&kind)
        .cloned()
        .unwrap_or_else(|| DEFAULT_LOGGER.clone())
}

/// Per-instance logging handle
///
/// Prefixes every message with `<ClassName>-<name_tag>`.
#[derive(Debug, Clone)]
pub(crate) struct ClientLog {
    kind: ClientKind,
    label: String,
}

impl ClientLog {
    pub(crate) fn new(kind: ClientKind, name_tag: Option<&str>) -> Self {
        let label = match name_tag {
            Some(tag) if !tag.is_empty() => format!("{}-{}", kind.class_name(), tag),
            _ => kind.class_name().to_string(),
        };
        Self { kind, label }
    }

    pub(crate) fn kind(&self) -> ClientKind {
        self.kind
    }

    pub(crate) fn debug(&self, message: impl AsRef<str>) {
        logger(self.kind).debug(&self.line(message.as_ref()));
    }

    pub(crate) fn info(&self, message: impl AsRef<str>) {
        logger(self.kind).info(&self.line(message.as_ref()));
    }

    pub(crate) fn warning(&self, message: impl AsRef<str>) {
        logger(self.kind).warning(&self.line(message.as_ref()));
    }

    pub(crate) fn error(&self, message: impl AsRef<str>) {
        logger(self.kind).error(&self.line(message.as_ref()));
    }

    fn line(&self, message: &str) -> String {
        format!("[{}] {}", self.label, message)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sink collecting `(level, message)` pairs
    #[derive(Debug, Default)]
    pub(crate) struct CaptureLogger {
        pub(crate) lines: Mutex<Vec<(&'static str, String)>>,
    }

    impl CaptureLogger {
        /// Messages logged by the client labelled `label`
        pub(crate) fn lines_for(&self, label: &str) -> Vec<(&'static str, String)> {
            let prefix = format!("[{}]", label);
            self.lines
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, line)| line.starts_with(&prefix))
                .cloned()
                .collect()
        }

        fn push(&self, level: &'static str, message: &str) {
            self.lines.lock().unwrap().push((level, message.to_string()));
        }
    }

    impl ClientLogger for CaptureLogger {
        fn debug(&self, message: &str) {
            self.push("debug", message);
        }

        fn info(&self, message: &str) {
            self.push("info", message);
        }

        fn warning(&self, message: &str) {
            self.push("warning", message);
        }

        fn error(&self, message: &str) {
            self.push("error", message);
        }
    }

    #[test]
    fn test_client_log_label() {
        let log = ClientLog::new(ClientKind::Serial, Some("pump"));
        assert_eq!(log.line("Connected!"), "[ModbusSerialClient-pump] Connected!");
        let untagged = ClientLog::new(ClientKind::Tcp, None);
        assert_eq!(untagged.line("x"), "[ModbusTcpClient] x");
    }

    #[test]
    fn test_set_and_reset_logger_per_kind() {
        // The tcp kind is only overridden by this test
        let capture = Arc::new(CaptureLogger::default());
        set_logger(ClientKind::Tcp, capture.clone());

        let log = ClientLog::new(ClientKind::Tcp, Some("hook-test"));
        log.warning("first");
        log.debug("second");

        let lines = capture.lines_for("ModbusTcpClient-hook-test");
        assert_eq!(
            lines,
            vec![
                ("warning", "[ModbusTcpClient-hook-test] first".to_string()),
                ("debug", "[ModbusTcpClient-hook-test] second".to_string()),
            ]
        );

        reset_logger(ClientKind::Tcp);
        log.error("after reset");
        assert_eq!(capture.lines_for("ModbusTcpClient-hook-test").len(), 2);
    }
}
