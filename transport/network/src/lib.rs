//! Network Module - UDP transport and DTLS-SRTP security
//!
//! Sockets, packet demultiplexing, the DTLS handshake engine and the SRTP
//! crypto suite registry used by the media transport.

pub mod error;
pub mod security;
pub mod transport;

pub use error::NetworkError;
pub use security::{
    CryptoSuite, DtlsConfig, DtlsEngine, DtlsIdentity, DtlsOutcome, DtlsRole, DtlsState,
    Fingerprint, HashAlgorithm, KeyInfo, KeyInfoPair,
};
pub use transport::{PacketKind, UdpTransport, classify_packet};

pub type Result<T> = std::result::Result<T, NetworkError>;

/// One-time process setup: builds the crypto suite registry.
pub fn init() {
    security::crypto_suite::init();
}
