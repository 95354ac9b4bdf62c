//! Error types for ICE operations.
//!
//! Negotiation problems never abort a transport; they surface to the
//! signaling layer as a failed call and leave the session untouched.

use stun::StunError;

/// Errors that can occur during ICE operations.
#[derive(Debug, Clone, PartialEq)]
pub enum IceError {
    /// ICE unusable with the current setup (disabled, no subchannels)
    Configuration(String),
    /// Remote offered no candidates at all
    NoCandidates,
    /// None of the remote candidates is UDP on a known component
    NoSuitableCandidates,
    /// Subchannel index out of range
    InvalidSubchannel(usize),
    /// Unknown candidate type token
    InvalidCandidateType(String),
    /// Unknown transport protocol token
    InvalidTransportProtocol(String),
    /// Malformed or unauthenticated STUN
    Stun(StunError),
}

impl std::fmt::Display for IceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IceError::Configuration(msg) => write!(f, "ICE configuration error: {}", msg),
            IceError::NoCandidates => write!(f, "No ICE candidates from remote"),
            IceError::NoSuitableCandidates => write!(f, "No suitable ICE candidates from remote"),
            IceError::InvalidSubchannel(sc) => write!(f, "Invalid subchannel: {}", sc),
            IceError::InvalidCandidateType(t) => write!(f, "Invalid candidate type: {}", t),
            IceError::InvalidTransportProtocol(p) => {
                write!(f, "Invalid transport protocol: {}", p)
            }
            IceError::Stun(err) => write!(f, "STUN error: {}", err),
        }
    }
}

impl std::error::Error for IceError {}

impl From<StunError> for IceError {
    fn from(err: StunError) -> Self {
        IceError::Stun(err)
    }
}
