//! UDP socket for one subchannel

use crate::error::{NetworkError, Result};
use logging::Logger;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Largest datagram a reader accepts.
pub const MAX_DATAGRAM: usize = 65536;

/// UDP transport shared between a reader thread and senders.
///
/// Every method takes `&self`, so the transport can live in an `Arc`.
pub struct UdpTransport {
    socket: UdpSocket,
    logger: Logger,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl UdpTransport {
    /// Create new UDP transport
    ///
    /// # Arguments
    /// * `bind_addr` - Local Address for bind
    /// * `logger` - Logger
    pub fn new(bind_addr: SocketAddr, logger: Logger) -> Result<Self> {
        logger.debug(&format!("Creating UDP socket at {}", bind_addr));

        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| NetworkError::Network(format!("Error creating socket: {}", e)))?;

        logger.info(&format!(
            "UDP socket bound at {}",
            socket.local_addr().map_or(bind_addr, |addr| addr)
        ));

        Ok(UdpTransport {
            socket,
            logger,
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Bounds how long [`UdpTransport::receive`] blocks.
    pub fn set_read_timeout(&self, timeout: Duration) -> Result<()> {
        self.socket.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    /// Send data to a peer
    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize> {
        let sent = self.socket.send_to(data, addr)?;
        self.update_send_stats(sent);
        Ok(sent)
    }

    /// Update send statistics and log if necessary
    fn update_send_stats(&self, sent: usize) {
        let total = self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed) + sent as u64;
        if total % 100_000 < sent as u64 {
            self.logger.debug(&format!("Total bytes sent: {}", total));
        }
    }

    /// Receive one datagram, blocking up to the read timeout
    ///
    /// # Returns
    /// * `Ok(Some((data, addr)))` - Data and sender address received
    /// * `Ok(None)` - Timed out
    /// * `Err` - Socket error
    pub fn receive(&self) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        match self.socket.recv_from(&mut buf) {
            Ok((size, addr)) => {
                buf.truncate(size);
                self.update_receive_stats(size);
                Ok(Some((buf, addr)))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            // ICMP port unreachable from an earlier send surfaces here on some platforms
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(NetworkError::Io(e)),
        }
    }

    /// Update receive statistics and log if necessary
    fn update_receive_stats(&self, size: usize) {
        let total = self.bytes_received.fetch_add(size as u64, Ordering::Relaxed) + size as u64;
        if total % 100_000 < size as u64 {
            self.logger.debug(&format!("Total bytes received: {}", total));
        }
    }

    /// Returns transport statistics (bytes_sent, bytes_received)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.bytes_sent.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
        )
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.socket.local_addr().ok())
            .finish_non_exhaustive()
    }
}
