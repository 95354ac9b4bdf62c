//! Security module for media transports
//!
//! Provides the DTLS handshake and the SRTP crypto suites it negotiates

pub mod crypto_suite;
pub mod dtls;
pub mod key_info;

pub use crypto_suite::CryptoSuite;
pub use dtls::{DtlsConfig, DtlsEngine, DtlsIdentity, DtlsOutcome, DtlsRole, DtlsState, Fingerprint, HashAlgorithm};
pub use key_info::{KeyInfo, KeyInfoPair};
