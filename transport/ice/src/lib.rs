//! ICE Module - Interactive Connectivity Establishment
//!
//! ICE-lite (RFC 8445 Section 2.5) as used by a media transport: local host
//! candidates, answering authenticated connectivity checks, nominating one
//! remote path per subchannel and filtering media by source.

pub mod candidate;
pub mod candidate_type;
pub mod credentials;
pub mod errors;
pub mod ice_agent;
pub mod ice_state;
pub mod ip_detection;

pub use candidate::{Candidate, CandidateState, TransportProtocol};
pub use candidate_type::CandidateType;
pub use credentials::Credentials;
pub use errors::IceError;
pub use ice_agent::{IceAgent, IceConfig, IceOutcome, LocalDescription, MediaFilter};
pub use ice_state::{IceRole, IceState};
pub use ip_detection::{detect_local_ip, resolve_host_address};
