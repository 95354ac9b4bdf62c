//! Network error types
//!
//! This module defines the error types used throughout the network module.
//! All errors are wrapped in `NetworkError` enum for consistent error handling.

use std::fmt;
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Network-related errors
#[derive(Debug)]
pub enum NetworkError {
    Config(String),
    Network(String),
    /// Socket failure; fatal for the subchannel that hit it
    Io(std::io::Error),
    CryptoError(String),
    /// Crypto suite or SRTP profile name not in the registry
    UnknownCryptoSuite(String),
    SecurityError(String),
    /// Peer certificate does not match the signaled fingerprint
    FingerprintMismatch,
    HandshakeTimeout,
    ThreadError(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Config(msg) => write!(f, "Config error: {}", msg),
            NetworkError::Network(msg) => write!(f, "Network error: {}", msg),
            NetworkError::Io(err) => write!(f, "I/O error: {}", err),
            NetworkError::CryptoError(msg) => write!(f, "Crypto error: {}", msg),
            NetworkError::UnknownCryptoSuite(name) => write!(f, "Unknown crypto suite: {}", name),
            NetworkError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            NetworkError::FingerprintMismatch => {
                write!(f, "Remote certificate does not match fingerprint")
            }
            NetworkError::HandshakeTimeout => write!(f, "DTLS handshake timeout"),
            NetworkError::ThreadError(msg) => write!(f, "Thread error: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Io(err)
    }
}

impl From<openssl::error::ErrorStack> for NetworkError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        NetworkError::CryptoError(err.to_string())
    }
}
