//! Stream accessor trait for transport layer

use async_trait::async_trait;
use modbus_core::{ModbusError, ModbusResult};

/// Stream accessor interface to access a physical stream to a remote device
#[async_trait]
pub trait StreamAccessor: Send {
    /// Read data from the stream
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> ModbusResult<usize>;

    /// Read exact number of bytes from the stream
    ///
    /// Returns a connection error if the stream ends before `buf` is filled.
    async fn read_exact(&mut self, mut buf: &mut [u8]) -> ModbusResult<()> {
        while !buf.is_empty() {
            let n = self.read(buf).await?;
            if n == 0 {
                return Err(ModbusError::connection(
                    "stream closed before the full frame was received",
                ));
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> ModbusResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> ModbusResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(ModbusError::connection("failed to write all data"));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> ModbusResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Check if a handle is still held, even on a stream marked closed by an I/O error
    fn holds_handle(&self) -> bool {
        !self.is_closed()
    }

    /// Close the stream
    async fn close(&mut self) -> ModbusResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical layer connection
    async fn open(&mut self) -> ModbusResult<()>;

    /// Short description of the remote endpoint, used in log lines
    fn peer(&self) -> String;
}
