//! DTLS (Datagram Transport Layer Security) for media transports
//!
//! Provides the DTLS-SRTP handshake that authenticates the peer by
//! certificate fingerprint and exports SRTP keying material.

mod certificate;
mod engine;
pub mod record;

pub use certificate::{DtlsIdentity, Fingerprint, HashAlgorithm};
pub use engine::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MTU, DtlsConfig, DtlsEngine, DtlsOutcome, DtlsRole,
    DtlsState, SRTP_EXPORTER_LABEL, split_key_material,
};
