//! Notifications from reader threads to the owning media session.

use network::NetworkError;
use std::net::SocketAddr;

/// Something a reader thread observed on one subchannel.
#[derive(Debug)]
pub enum TransportEvent {
    /// Datagram that was neither STUN nor DTLS, from an accepted source
    Media {
        subchannel: usize,
        source: SocketAddr,
        data: Vec<u8>,
    },
    /// Every subchannel has a path and, when secure, keys exist
    Established,
    /// DTLS failed; the transport stays open for a retry
    HandshakeFailed {
        subchannel: usize,
        error: NetworkError,
    },
    /// Nothing received for the current read timeout
    Timeout { subchannel: usize },
    /// Peer sent close_notify; the subchannel reader has stopped
    Closed { subchannel: usize },
    /// Socket failure; the transport is unusable
    Failed {
        subchannel: usize,
        error: NetworkError,
    },
}
