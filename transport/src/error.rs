//! Errors surfaced to the signaling layer.

use ice::IceError;
use network::NetworkError;
use std::fmt;

#[derive(Debug)]
pub enum TransportError {
    /// Bad open parameters or a feature that is switched off
    Config(String),
    Ice(IceError),
    Network(NetworkError),
    /// Operation on a closed transport
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Config(msg) => write!(f, "Config error: {}", msg),
            TransportError::Ice(err) => write!(f, "{}", err),
            TransportError::Network(err) => write!(f, "{}", err),
            TransportError::Closed => write!(f, "Transport closed"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Ice(err) => Some(err),
            TransportError::Network(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IceError> for TransportError {
    fn from(err: IceError) -> Self {
        TransportError::Ice(err)
    }
}

impl From<NetworkError> for TransportError {
    fn from(err: NetworkError) -> Self {
        TransportError::Network(err)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_passes_through() {
        let err: TransportError = IceError::NoCandidates.into();
        assert_eq!(err.to_string(), "No ICE candidates from remote");
        let err: TransportError = NetworkError::HandshakeTimeout.into();
        assert_eq!(err.to_string(), "DTLS handshake timeout");
        assert!(std::error::Error::source(&err).is_some());
    }
}
