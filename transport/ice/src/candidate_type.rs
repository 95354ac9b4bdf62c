//! ICE candidate types.
//!
//! Each type carries the RFC 8445 recommended type preference, which forms
//! the top byte of a candidate priority. The final-marker type is the
//! trickle ICE end-of-candidates indication and has no preference.

use crate::errors::IceError;

/// Type preference of host candidates.
pub const HOST_PREFERENCE: u32 = 126;
/// Type preference of peer reflexive candidates.
pub const PEER_REFLEXIVE_PREFERENCE: u32 = 110;
/// Type preference of server reflexive candidates.
pub const SERVER_REFLEXIVE_PREFERENCE: u32 = 100;
/// Type preference of relayed candidates.
pub const RELAY_PREFERENCE: u32 = 0;

/// Kind of network path a candidate describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CandidateType {
    /// Local interface address
    #[default]
    Host,
    /// Learned from an inbound connectivity check
    Prflx,
    /// NAT mapping learned from a STUN server
    Srflx,
    /// Address allocated on a TURN server
    Relay,
    /// End-of-candidates marker used with trickle ICE
    Final,
}

impl CandidateType {
    /// Parses the SDP token of a candidate type.
    ///
    /// # Errors
    /// `InvalidCandidateType` for anything else.
    pub fn parse(s: &str) -> Result<Self, IceError> {
        match s.to_ascii_lowercase().as_str() {
            "host" => Ok(CandidateType::Host),
            "prflx" => Ok(CandidateType::Prflx),
            "srflx" => Ok(CandidateType::Srflx),
            "relay" => Ok(CandidateType::Relay),
            "end-of-candidates" => Ok(CandidateType::Final),
            _ => Err(IceError::InvalidCandidateType(s.to_string())),
        }
    }

    /// Returns the SDP token of the candidate type.
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateType::Host => "host",
            CandidateType::Prflx => "prflx",
            CandidateType::Srflx => "srflx",
            CandidateType::Relay => "relay",
            CandidateType::Final => "end-of-candidates",
        }
    }

    /// Type preference placed in bits 24..32 of the priority.
    pub fn type_preference(&self) -> u32 {
        match self {
            CandidateType::Host => HOST_PREFERENCE,
            CandidateType::Prflx => PEER_REFLEXIVE_PREFERENCE,
            CandidateType::Srflx => SERVER_REFLEXIVE_PREFERENCE,
            CandidateType::Relay | CandidateType::Final => RELAY_PREFERENCE,
        }
    }

    /// Recovers a type from the top byte of a priority.
    ///
    /// Only the four recommended preference values map back; anything else
    /// is a custom local policy and yields `None`.
    pub fn from_type_preference(preference: u32) -> Option<Self> {
        match preference {
            HOST_PREFERENCE => Some(CandidateType::Host),
            PEER_REFLEXIVE_PREFERENCE => Some(CandidateType::Prflx),
            SERVER_REFLEXIVE_PREFERENCE => Some(CandidateType::Srflx),
            RELAY_PREFERENCE => Some(CandidateType::Relay),
            _ => None,
        }
    }
}

impl std::fmt::Display for CandidateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
