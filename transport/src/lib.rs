//! # Media Transport - secure media path establishment
//!
//! This library sets up the UDP path a call's audio and video travel on.
//! An ICE-lite agent answers connectivity checks and selects the remote
//! address; a DTLS handshake over the same sockets authenticates the peer
//! by certificate fingerprint and exports SRTP keys.
//!
//! ## Public API
//!
//! ### Transport
//! - **`MediaTransport`** - Sockets, reader threads, ICE and DTLS for one call
//! - **`TransportConfig`** - ICE flags, read timeouts and DTLS parameters
//! - **`TransportEvent`** - Media and state changes reported by reader threads
//!
//! ### ICE (for signaling)
//! - **`Candidate`** - ICE candidate representation
//! - **`LocalDescription`** - Local ufrag, password and candidates
//! - **`IceState`** - Negotiation progress
//!
//! ### Security
//! - **`Fingerprint`** - Certificate digest exchanged through signaling
//! - **`KeyInfo`** - SRTP key and salt for one direction
//! - **`CryptoSuite`** - Registered SRTP protection profiles
//!
//! ## Example Usage
//!
//! ```no_run
//! use logging::Logger;
//! use media_transport::{MediaTransport, TransportConfig};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! media_transport::init();
//!
//! let (transport, events) = MediaTransport::open(
//!     TransportConfig::default(),
//!     2,
//!     IpAddr::V4(Ipv4Addr::UNSPECIFIED),
//!     None,
//!     Logger::discard(),
//! )
//! .unwrap();
//!
//! // Goes into the SDP offer
//! let offer = transport.get_candidates(true).unwrap();
//! let fingerprint = transport.get_local_fingerprint(None).unwrap();
//! println!("a=fingerprint:{}", fingerprint);
//!
//! // ... answer arrives, then:
//! // transport.set_candidates(&ufrag, &pwd, &candidates);
//! // transport.set_remote_fingerprint(remote_fingerprint);
//! # let _ = (offer, events);
//! ```

mod config;
mod error;
mod event;
mod media_transport;
mod reader;
mod scheduler;

pub use config::{
    DEFAULT_TICK, KEEPALIVE_INTERVAL, MIN_READ_TIMEOUT, TransportConfig, TransportConfigBuilder,
};
pub use error::{Result, TransportError};
pub use event::TransportEvent;
pub use media_transport::{
    CONTROL_SUBCHANNEL, DATA_SUBCHANNEL, MAX_SUBCHANNELS, MediaTransport, SubchannelStatistics,
    TransportStatistics,
};

pub use ice::{
    Candidate, CandidateState, CandidateType, IceError, IceRole, IceState, LocalDescription,
    TransportProtocol,
};
pub use network::{
    CryptoSuite, DtlsRole, DtlsState, Fingerprint, HashAlgorithm, KeyInfo, KeyInfoPair,
    NetworkError,
};

/// One-time process setup; call before opening a secure transport.
pub fn init() {
    network::init();
}
