//! TCP transport implementation

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use modbus_core::{ModbusError, ModbusResult};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream").finish()
    }
}

impl Deref for DebugTcpStream {
    type Target = TcpStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugTcpStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    /// Bound on connection establishment. None waits for the OS timeout.
    pub connect_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Some(Duration::from_secs(5)),
        }
    }

    /// Create TCP settings with a connect timeout
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Some(timeout),
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }

    fn stream_mut(&mut self) -> ModbusResult<&mut DebugTcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| ModbusError::connection("TCP stream not connected"))
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> ModbusResult<()> {
        if !self.closed {
            return Err(ModbusError::connection("Connection has already been opened"));
        }

        let target = (self.settings.host.as_str(), self.settings.port);
        let connected = if let Some(timeout) = self.settings.connect_timeout {
            tokio::time::timeout(timeout, TcpStream::connect(target))
                .await
                .map_err(|_| {
                    ModbusError::connection(format!(
                        "connect to {} timed out after {:?}",
                        self.peer(),
                        timeout
                    ))
                })?
        } else {
            TcpStream::connect(target).await
        };
        let stream = connected.map_err(|e| {
            ModbusError::connection(format!("connect to {} failed: {}", self.peer(), e))
        })?;

        // Modbus frames are small request/response pairs
        let _ = stream.set_nodelay(true);

        log::debug!("TCP connected to {}", self.peer());
        self.stream = Some(DebugTcpStream(stream));
        self.closed = false;
        Ok(())
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> ModbusResult<usize> {
        let result = self.stream_mut()?.read(buf).await.map_err(ModbusError::from);

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> ModbusResult<usize> {
        let result = self.stream_mut()?.write(buf).await.map_err(ModbusError::from);
        if result.is_err() {
            self.closed = true;
        }
        result
    }

    async fn flush(&mut self) -> ModbusResult<()> {
        self.stream_mut()?.flush().await.map_err(ModbusError::from)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn holds_handle(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            log::debug!("TCP connection to {} closed", self.peer());
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_tcp_settings() {
        let settings = TcpSettings::new("127.0.0.1", 502);
        assert_eq!(settings.port, 502);
        assert!(settings.connect_timeout.is_some());
    }

    #[tokio::test]
    async fn test_tcp_open_write_read_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 3];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut transport = TcpTransport::new(TcpSettings::new("127.0.0.1", port));
        assert!(transport.is_closed());
        assert_ok!(transport.open().await);
        assert!(!transport.is_closed());
        assert_err!(transport.open().await);

        assert_ok!(transport.write_all(&[1, 2, 3]).await);
        let mut echo = [0u8; 3];
        assert_ok!(transport.read_exact(&mut echo).await);
        assert_eq!(echo, [1, 2, 3]);

        assert_ok!(transport.close().await);
        assert!(transport.is_closed());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_read_after_hang_up_keeps_handle_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut transport = TcpTransport::new(TcpSettings::new("127.0.0.1", port));
        assert!(!transport.holds_handle());
        assert_ok!(transport.open().await);
        server.await.unwrap();

        let mut buf = [0u8; 4];
        assert_err!(transport.read_exact(&mut buf).await);
        assert!(transport.is_closed());
        assert!(transport.holds_handle());

        assert_ok!(transport.close().await);
        assert!(!transport.holds_handle());
    }

    #[tokio::test]
    async fn test_tcp_open_refused_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = TcpTransport::new(TcpSettings::new("127.0.0.1", port));
        let err = assert_err!(transport.open().await);
        assert_eq!(err.kind(), modbus_core::ErrorKind::Connection);
        assert!(transport.is_closed());
    }
}
