//! Request/response exchange over a framed link
//!
//! A [`Link`] is the capability the client core needs from a transport
//! backend: open it, close it, and perform exactly one protocol exchange.
//! Construction picks the backend; everything above this trait is
//! transport-agnostic.
//!
//! # Implementations
//! - [`RtuLink`]: RTU framing over any byte transport (normally a serial line)
//! - [`TcpLink`]: MBAP framing over any byte transport (normally a TCP socket)
//! - [`SimulatorLink`](crate::SimulatorLink): in-memory device, no I/O

use crate::mbap::{MbapHeader, TransactionIds, MBAP_HEADER_LENGTH};
use crate::rtu;
use crate::statistics::LinkStatistics;
use crate::format_hex;
use async_trait::async_trait;
use modbus_core::pdu::{self, MAX_PDU_LENGTH};
use modbus_core::{ModbusError, ModbusResult, Request, Response};
use modbus_transport::TransportLayer;

/// Link to one remote device (or one gateway)
///
/// Deadlines are applied by the caller around [`Link::exchange`]; a link
/// only reports what happened on the wire.
#[async_trait]
pub trait Link: Send {
    /// Open the underlying channel
    ///
    /// # Errors
    /// Returns `ModbusError::Connection` if the channel cannot be opened
    async fn open(&mut self) -> ModbusResult<()>;

    /// Close the underlying channel
    ///
    /// Closing a link that is not open is a no-op.
    async fn close(&mut self) -> ModbusResult<()>;

    /// Check if the channel is open
    fn is_open(&self) -> bool;

    /// Send one request and wait for its response
    ///
    /// # Errors
    /// - `ModbusError::Protocol` if the device answered with an exception
    /// - `ModbusError::Connection` on I/O failure or a corrupt response
    async fn exchange(&mut self, request: &Request) -> ModbusResult<Response>;

    /// Snapshot of the link counters
    fn statistics(&self) -> LinkStatistics;

    /// Short description of the remote endpoint, used in log lines
    fn describe(&self) -> String;
}

/// RTU framed link
#[derive(Debug)]
pub struct RtuLink<T: TransportLayer> {
    transport: T,
    statistics: LinkStatistics,
}

impl<T: TransportLayer> RtuLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            statistics: LinkStatistics::new(),
        }
    }

    async fn transact(&mut self, request: &Request) -> ModbusResult<Response> {
        if self.transport.is_closed() {
            return Err(ModbusError::connection("RTU link is not open"));
        }

        let adu = rtu::encode_adu(request);
        log::trace!("RTU TX {}: {}", self.transport.peer(), format_hex(&adu));
        self.transport.write_all(&adu).await?;
        self.transport.flush().await?;

        let frame = rtu::read_adu(&mut self.transport).await?;
        log::trace!("RTU RX {}: {}", self.transport.peer(), format_hex(&frame));
        let pdu = rtu::decode_adu(request.unit_id(), &frame)?;
        pdu::decode_response(request, pdu)
    }
}

#[async_trait]
impl<T: TransportLayer> Link for RtuLink<T> {
    async fn open(&mut self) -> ModbusResult<()> {
        self.transport.open().await?;
        self.statistics.increment_opens();
        Ok(())
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if self.transport.holds_handle() {
            self.statistics.increment_closes();
        }
        self.transport.close().await
    }

    fn is_open(&self) -> bool {
        !self.transport.is_closed()
    }

    async fn exchange(&mut self, request: &Request) -> ModbusResult<Response> {
        let result = self.transact(request).await;
        self.statistics.record(&result);
        result
    }

    fn statistics(&self) -> LinkStatistics {
        self.statistics.clone()
    }

    fn describe(&self) -> String {
        format!("rtu://{}", self.transport.peer())
    }
}

/// MBAP framed link
#[derive(Debug)]
pub struct TcpLink<T: TransportLayer> {
    transport: T,
    transaction_ids: TransactionIds,
    statistics: LinkStatistics,
}

impl<T: TransportLayer> TcpLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            transaction_ids: TransactionIds::new(),
            statistics: LinkStatistics::new(),
        }
    }

    async fn transact(&mut self, request: &Request) -> ModbusResult<Response> {
        if self.transport.is_closed() {
            return Err(ModbusError::connection("TCP link is not open"));
        }

        let pdu = pdu::encode_request(request);
        let transaction_id = self.transaction_ids.next_id();
        let header = MbapHeader::new(transaction_id, request.unit_id(), pdu.len());
        let mut adu = Vec::with_capacity(MBAP_HEADER_LENGTH + pdu.len());
        adu.extend_from_slice(&header.encode());
        adu.extend_from_slice(&pdu);

        log::trace!("TCP TX {}: {}", self.transport.peer(), format_hex(&adu));
        self.transport.write_all(&adu).await?;
        self.transport.flush().await?;

        let mut header_bytes = [0u8; MBAP_HEADER_LENGTH];
        self.transport.read_exact(&mut header_bytes).await?;
        let response_header = MbapHeader::decode(&header_bytes)?;
        if response_header.transaction_id() != transaction_id {
            return Err(ModbusError::connection(format!(
                "transaction id mismatch: sent {}, got {}",
                transaction_id,
                response_header.transaction_id()
            )));
        }
        if response_header.pdu_length() > MAX_PDU_LENGTH {
            return Err(ModbusError::connection(format!(
                "MBAP length {} exceeds the maximum PDU size",
                response_header.pdu_length()
            )));
        }

        let mut response_pdu = vec![0u8; response_header.pdu_length()];
        self.transport.read_exact(&mut response_pdu).await?;
        log::trace!(
            "TCP RX {}: {} {}",
            self.transport.peer(),
            format_hex(&header_bytes),
            format_hex(&response_pdu)
        );

        if response_header.unit_id() != request.unit_id() {
            return Err(ModbusError::connection(format!(
                "response from unit {}, expected unit {}",
                response_header.unit_id(),
                request.unit_id()
            )));
        }
        pdu::decode_response(request, &response_pdu)
    }
}

#[async_trait]
impl<T: TransportLayer> Link for TcpLink<T> {
    async fn open(&mut self) -> ModbusResult<()> {
        self.transport.open().await?;
        self.statistics.increment_opens();
        Ok(())
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if self.transport.holds_handle() {
            self.statistics.increment_closes();
        }
        self.transport.close().await
    }

    fn is_open(&self) -> bool {
        !self.transport.is_closed()
    }

    async fn exchange(&mut self, request: &Request) -> ModbusResult<Response> {
        let result = self.transact(request).await;
        self.statistics.record(&result);
        result
    }

    fn statistics(&self) -> LinkStatistics {
        self.statistics.clone()
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.transport.peer())
    }
}
